//! In-process message bus with direct-exchange semantics.
//!
//! Each topic maps to one bounded channel created when a consumer binds.
//! Publishing to a topic nobody has bound fails with `UnknownTopic`, same
//! as an unroutable message on a direct exchange. Per-topic FIFO order is
//! what the underlying channel gives; cross-topic order is not defined.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::application::ports::{BusConsumerPort, BusError, BusPublisherPort, Delivery};

const DEFAULT_CAPACITY: usize = 1024;

/// Shared in-process bus. Cheap to clone via `Arc` at the wiring site.
#[derive(Debug)]
pub struct InMemoryBus {
    capacity: usize,
    bindings: Mutex<HashMap<String, mpsc::Sender<Delivery>>>,
}

impl InMemoryBus {
    /// Create a bus with the default per-topic capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus with a custom per-topic channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            bindings: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BusPublisherPort for InMemoryBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError> {
        let sender = {
            let bindings = self.bindings.lock().unwrap_or_else(|e| e.into_inner());
            bindings.get(topic).cloned()
        };
        let Some(sender) = sender else {
            return Err(BusError::UnknownTopic {
                topic: topic.to_string(),
            });
        };

        let delivery = Delivery {
            topic: topic.to_string(),
            payload,
        };
        // Backpressure: a full topic blocks the publisher instead of
        // dropping events.
        sender
            .send(delivery)
            .await
            .map_err(|_| BusError::PublishFailed {
                message: format!("consumer for topic {topic} is gone"),
            })
    }
}

#[async_trait]
impl BusConsumerPort for InMemoryBus {
    async fn consume(&self, topic: &str) -> Result<mpsc::Receiver<Delivery>, BusError> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut bindings = self.bindings.lock().unwrap_or_else(|e| e.into_inner());
        // Rebinding a topic replaces the previous consumer; its channel
        // closes when the displaced sender is dropped.
        bindings.insert(topic.to_string(), tx);
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_consumer_is_unroutable() {
        let bus = InMemoryBus::new();
        let err = bus.publish("order.updates", b"{}".to_vec()).await;
        assert!(matches!(err, Err(BusError::UnknownTopic { .. })));
    }

    #[tokio::test]
    async fn deliveries_arrive_in_publish_order() {
        let bus = InMemoryBus::new();
        let mut rx = bus.consume("order.updates").await.unwrap();

        for i in 0..5u8 {
            bus.publish("order.updates", vec![i]).await.unwrap();
        }

        for i in 0..5u8 {
            let delivery = rx.recv().await.unwrap();
            assert_eq!(delivery.payload, vec![i]);
            assert_eq!(delivery.topic, "order.updates");
        }
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let bus = InMemoryBus::new();
        let mut orders = bus.consume("order.updates").await.unwrap();
        let mut positions = bus.consume("position.updates").await.unwrap();

        bus.publish("position.updates", b"p".to_vec()).await.unwrap();

        assert_eq!(positions.recv().await.unwrap().payload, b"p".to_vec());
        assert!(orders.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropped_consumer_fails_publish() {
        let bus = InMemoryBus::new();
        let rx = bus.consume("order.updates").await.unwrap();
        drop(rx);

        let err = bus.publish("order.updates", b"{}".to_vec()).await;
        assert!(matches!(err, Err(BusError::PublishFailed { .. })));
    }
}
