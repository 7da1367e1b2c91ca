//! Shared domain value objects used across the bridge.

mod identifiers;
mod symbol;
mod timestamp;

pub use identifiers::{ExchangeOrderId, OrderId, PortfolioId, RequestId};
pub use symbol::Symbol;
pub use timestamp::Timestamp;
