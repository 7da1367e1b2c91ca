//! Use cases driving commands toward the broker.

mod cancel_order;
mod route_order;

pub use cancel_order::{CancelError, CancelOrderUseCase};
pub use route_order::{RouteError, RouteOrderUseCase, RouteOutcome};
