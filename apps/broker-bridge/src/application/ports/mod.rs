//! Application Ports (Driver and Driven)
//!
//! Ports define interfaces for interacting with external systems.
//! - **Driver Ports** (Primary/Inbound): How the world uses our application
//! - **Driven Ports** (Secondary/Outbound): How our application uses external systems

mod breakdown_cache;
mod broker_port;
mod bus_port;
mod store_port;

pub use breakdown_cache::BreakdownCache;
pub use broker_port::{BrokerCommandPort, BrokerDiff, BrokerDiffPort, BrokerError, BrokerOrder};
pub use bus_port::{BusConsumerPort, BusError, BusPublisherPort, Delivery, topics};
pub use store_port::{
    KvCachePort, OrderEventRecord, OrderRecord, OrderStorePort, StoreError, account_cache_key,
    position_cache_key,
};
