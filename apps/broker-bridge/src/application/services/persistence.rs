//! Durable sinks for the event topics.
//!
//! Consumes the three update topics and writes:
//!
//! - order events: full-state upsert of the current-state row plus an
//!   append-only audit log entry;
//! - position events: TTL cache entry per portfolio and symbol;
//! - account events: TTL cache entry per portfolio.
//!
//! The bus is at-least-once, so every write path tolerates redelivery: the
//! row upsert is idempotent, cache writes overwrite, and duplicate audit
//! rows are accepted. A per-key timestamp guard keeps reordered deliveries
//! from rolling current state backwards; stale events still reach the audit
//! log, which preserves arrival history rather than event order.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{StreamExt, StreamMap};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::ports::{
    BusConsumerPort, Delivery, KvCachePort, OrderEventRecord, OrderRecord, OrderStorePort,
    account_cache_key, position_cache_key, topics,
};
use crate::domain::events::{AccountUpdate, DomainEvent, OrderUpdate, PositionUpdate};
use crate::domain::shared::Timestamp;
use crate::observability::record_stale_update;

/// Rejects writes older than the newest already applied for a key.
///
/// Entries are kept after terminal events: a delayed pre-terminal delivery
/// must still be rejected, or it would roll the final state row back.
#[derive(Debug, Default)]
struct StaleGuard {
    last_applied: Mutex<HashMap<String, Timestamp>>,
}

impl StaleGuard {
    /// Record `timestamp` for `key` and report whether it may be applied.
    /// Equal timestamps pass, so exact redelivery stays idempotent.
    fn admit(&self, key: &str, timestamp: Timestamp) -> bool {
        let mut last_applied = self.last_applied.lock().unwrap_or_else(|e| e.into_inner());
        match last_applied.get(key) {
            Some(last) if *last > timestamp => false,
            _ => {
                last_applied.insert(key.to_string(), timestamp);
                true
            }
        }
    }
}

/// Time-to-live settings for cached state.
#[derive(Debug, Clone)]
pub struct CacheTtl {
    /// Expiry for position entries.
    pub position: Duration,
    /// Expiry for account entries.
    pub account: Duration,
}

impl Default for CacheTtl {
    fn default() -> Self {
        Self {
            position: Duration::from_secs(24 * 60 * 60),
            account: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Event-to-storage handler set.
pub struct PersistenceService<S, K>
where
    S: OrderStorePort,
    K: KvCachePort,
{
    order_store: Arc<S>,
    cache: Arc<K>,
    ttl: CacheTtl,
    guard: StaleGuard,
}

impl<S, K> PersistenceService<S, K>
where
    S: OrderStorePort,
    K: KvCachePort,
{
    /// Create the handler set over its two stores.
    pub fn new(order_store: Arc<S>, cache: Arc<K>, ttl: CacheTtl) -> Self {
        Self {
            order_store,
            cache,
            ttl,
            guard: StaleGuard::default(),
        }
    }

    /// Dispatch one event to its sink.
    pub async fn handle_event(&self, event: &DomainEvent) {
        match event {
            DomainEvent::OrderUpdate(update) => self.handle_order(update).await,
            DomainEvent::PositionUpdate(update) => self.handle_position(update).await,
            DomainEvent::AccountUpdate(update) => self.handle_account(update).await,
        }
    }

    async fn handle_order(&self, update: &OrderUpdate) {
        let guard_key = format!("order:{}", update.order_id);
        if self.guard.admit(&guard_key, update.timestamp) {
            let record = OrderRecord::from_update(update);
            if let Err(e) = self.order_store.upsert_order(record).await {
                error!(order_id = %update.order_id, error = %e, "order row upsert failed");
            }
        } else {
            record_stale_update();
            debug!(
                order_id = %update.order_id,
                event_type = update.event_type.as_str(),
                "stale order event, state write skipped"
            );
        }

        // Audit rows are append-only and keep even out-of-order events.
        let payload = match serde_json::to_value(update) {
            Ok(payload) => payload,
            Err(e) => {
                error!(order_id = %update.order_id, error = %e, "order event not serializable");
                return;
            }
        };
        let event_record = OrderEventRecord {
            order_id: update.order_id.clone(),
            portfolio_id: update.portfolio_id.clone(),
            event_type: update.event_type,
            payload,
            created_at: update.timestamp,
        };
        if let Err(e) = self.order_store.append_event(event_record).await {
            error!(order_id = %update.order_id, error = %e, "order event append failed");
        }
    }

    async fn handle_position(&self, update: &PositionUpdate) {
        let key = position_cache_key(&update.portfolio_id, &update.symbol);
        if !self.guard.admit(&key, update.timestamp) {
            record_stale_update();
            return;
        }
        let value = match serde_json::to_string(update) {
            Ok(value) => value,
            Err(e) => {
                error!(symbol = %update.symbol, error = %e, "position event not serializable");
                return;
            }
        };
        if let Err(e) = self.cache.set_with_ttl(&key, value, self.ttl.position).await {
            error!(key, error = %e, "position cache write failed");
        }
    }

    async fn handle_account(&self, update: &AccountUpdate) {
        let key = account_cache_key(&update.portfolio_id);
        if !self.guard.admit(&key, update.timestamp) {
            record_stale_update();
            return;
        }
        let value = match serde_json::to_string(update) {
            Ok(value) => value,
            Err(e) => {
                error!(portfolio_id = %update.portfolio_id, error = %e, "account event not serializable");
                return;
            }
        };
        if let Err(e) = self.cache.set_with_ttl(&key, value, self.ttl.account).await {
            error!(key, error = %e, "account cache write failed");
        }
    }
}

/// Consumer task binding the handler set to the update topics.
pub struct PersistenceWorker<B, S, K>
where
    B: BusConsumerPort,
    S: OrderStorePort,
    K: KvCachePort,
{
    consumer: Arc<B>,
    service: PersistenceService<S, K>,
    shutdown: CancellationToken,
}

impl<B, S, K> PersistenceWorker<B, S, K>
where
    B: BusConsumerPort,
    S: OrderStorePort,
    K: KvCachePort,
{
    /// Create the worker.
    pub fn new(
        consumer: Arc<B>,
        service: PersistenceService<S, K>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            consumer,
            service,
            shutdown,
        }
    }

    /// Consume the three update topics until shutdown.
    ///
    /// # Errors
    ///
    /// Returns the subscription error when a topic cannot be consumed.
    pub async fn run(self) -> Result<(), crate::application::ports::BusError> {
        let mut streams = StreamMap::new();
        for topic in [
            topics::ORDER_UPDATES,
            topics::POSITION_UPDATES,
            topics::ACCOUNT_UPDATES,
        ] {
            let receiver = self.consumer.consume(topic).await?;
            streams.insert(topic, ReceiverStream::new(receiver));
        }
        info!("persistence worker started");

        loop {
            let next = tokio::select! {
                () = self.shutdown.cancelled() => {
                    info!("persistence worker shutting down");
                    return Ok(());
                }
                next = streams.next() => next,
            };
            // The merged stream ends only once every topic is closed.
            let Some((_, delivery)) = next else {
                info!("update topics closed, persistence worker stopping");
                return Ok(());
            };
            self.process(delivery).await;
        }
    }

    async fn process(&self, delivery: Delivery) {
        match serde_json::from_slice::<DomainEvent>(&delivery.payload) {
            Ok(event) => self.service.handle_event(&event).await,
            Err(e) => {
                warn!(topic = %delivery.topic, error = %e, "undecodable delivery dropped");
            }
        }
    }
}
