//! In-memory implementations of the persistence ports.
//!
//! Suitable for development and testing; state dies with the process.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::application::ports::{
    KvCachePort, OrderEventRecord, OrderRecord, OrderStorePort, StoreError,
};
use crate::domain::shared::OrderId;

/// In-memory implementation of `OrderStorePort`.
///
/// Current-state rows live in a map keyed by order id; event rows append to
/// a vector whose index order doubles as the assigned sequence.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    rows: RwLock<HashMap<OrderId, OrderRecord>>,
    events: RwLock<Vec<OrderEventRecord>>,
}

impl InMemoryOrderStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current-state row for an order, if present.
    #[must_use]
    pub fn order(&self, order_id: &OrderId) -> Option<OrderRecord> {
        self.rows
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(order_id)
            .cloned()
    }

    /// Number of current-state rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the store holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All logged events for one order, in append order.
    #[must_use]
    pub fn events_for(&self, order_id: &OrderId) -> Vec<OrderEventRecord> {
        self.events
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|e| &e.order_id == order_id)
            .cloned()
            .collect()
    }

    /// Total number of logged events.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl OrderStorePort for InMemoryOrderStore {
    async fn upsert_order(&self, record: OrderRecord) -> Result<(), StoreError> {
        let mut rows = self.rows.write().unwrap_or_else(|e| e.into_inner());
        rows.insert(record.order_id.clone(), record);
        Ok(())
    }

    async fn get_order(&self, order_id: &OrderId) -> Result<Option<OrderRecord>, StoreError> {
        let rows = self.rows.read().unwrap_or_else(|e| e.into_inner());
        Ok(rows.get(order_id).cloned())
    }

    async fn append_event(&self, record: OrderEventRecord) -> Result<u64, StoreError> {
        let mut events = self.events.write().unwrap_or_else(|e| e.into_inner());
        events.push(record);
        Ok(events.len() as u64)
    }
}

/// In-memory implementation of `KvCachePort` with lazy expiry.
///
/// Expired entries are dropped on read; nothing sweeps in the background.
#[derive(Debug, Default)]
pub struct InMemoryKvCache {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl InMemoryKvCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous read for inspection, honoring expiry without evicting.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(value, _)| value.clone())
    }
}

#[async_trait]
impl KvCachePort for InMemoryKvCache {
    async fn set_with_ttl(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let expires_at = Instant::now() + ttl;
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), (value, expires_at));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let expired = {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            match entries.get(key) {
                None => return Ok(None),
                Some((value, expires_at)) => {
                    if *expires_at > Instant::now() {
                        return Ok(Some(value.clone()));
                    }
                    true
                }
            }
        };
        if expired {
            let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
            entries.remove(key);
        }
        Ok(None)
    }
}
