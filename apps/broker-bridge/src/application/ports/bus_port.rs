//! Message bus ports (driven).
//!
//! The bus guarantees at-least-once delivery: a message may arrive more than
//! once but never zero times absent explicit failure. Consumers must be
//! idempotent. Per-topic publish order is preserved for a single consumer.

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Well-known topic names.
pub mod topics {
    /// Outbound order lifecycle events.
    pub const ORDER_UPDATES: &str = "order.updates";
    /// Outbound position snapshots.
    pub const POSITION_UPDATES: &str = "position.updates";
    /// Outbound account snapshots.
    pub const ACCOUNT_UPDATES: &str = "account.updates";
    /// Inbound submit requests.
    pub const ORDER_SUBMIT: &str = "order.submit";
    /// Inbound cancel requests.
    pub const ORDER_CANCEL: &str = "order.cancel";
}

/// Event publishing error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BusError {
    /// Connection error.
    #[error("Bus connection error: {message}")]
    ConnectionError {
        /// Error details.
        message: String,
    },

    /// Serialization error.
    #[error("Bus serialization error: {message}")]
    SerializationError {
        /// Error details.
        message: String,
    },

    /// Publishing failed.
    #[error("Bus publish failed: {message}")]
    PublishFailed {
        /// Error details.
        message: String,
    },

    /// The requested topic has no consumer binding.
    #[error("Unknown bus topic: {topic}")]
    UnknownTopic {
        /// The topic name.
        topic: String,
    },
}

/// A raw delivery from the bus.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Topic the message was published to.
    pub topic: String,
    /// Serialized message payload.
    pub payload: Vec<u8>,
}

/// Port for publishing serialized messages.
#[async_trait]
pub trait BusPublisherPort: Send + Sync {
    /// Publish one message to a topic.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError>;
}

/// Port for consuming a topic as a stream of deliveries.
#[async_trait]
pub trait BusConsumerPort: Send + Sync {
    /// Subscribe to a topic. Deliveries for one topic arrive in publish
    /// order; duplicates are possible and must be tolerated downstream.
    async fn consume(&self, topic: &str) -> Result<mpsc::Receiver<Delivery>, BusError>;
}
