//! Infrastructure layer: concrete adapters behind the application ports.

pub mod broker;
pub mod bus;
pub mod cache;
pub mod persistence;

pub use broker::SimBroker;
pub use bus::InMemoryBus;
pub use cache::LockedBreakdownCache;
pub use persistence::{InMemoryKvCache, InMemoryOrderStore};
