//! Broker adapters.

mod sim;

pub use sim::SimBroker;
