//! Persistence ports (driven): relational order store and key-value cache.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::events::{OrderEventKind, OrderUpdate};
use crate::domain::order::{Direction, Offset, OrderStatus};
use crate::domain::shared::{ExchangeOrderId, OrderId, PortfolioId, Symbol, Timestamp};

/// Store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// Connection error.
    #[error("Store connection error: {message}")]
    ConnectionError {
        /// Error details.
        message: String,
    },

    /// A write was refused by the store.
    #[error("Store write failed: {message}")]
    WriteFailed {
        /// Error details.
        message: String,
    },
}

/// Current-state row for one order, keyed by `order_id`.
///
/// Written with full-state overwrite semantics, never merged field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Caller-assigned order id (primary key).
    pub order_id: OrderId,
    /// Exchange-assigned id, if known.
    pub exchange_order_id: Option<ExchangeOrderId>,
    /// Owning portfolio.
    pub portfolio_id: PortfolioId,
    /// Contract symbol.
    pub symbol: Symbol,
    /// Buy or sell.
    pub direction: Direction,
    /// Position effect.
    pub offset: Offset,
    /// Broker status.
    pub status: OrderStatus,
    /// Originally requested volume.
    pub volume_orign: u32,
    /// Volume still unfilled.
    pub volume_left: u32,
    /// Volume filled so far.
    pub filled_quantity: u32,
    /// Limit price, `None` for market orders.
    pub limit_price: Option<Decimal>,
    /// Volume-weighted average fill price, if any.
    pub trade_price: Option<Decimal>,
    /// Broker insert time.
    pub insert_date_time: Timestamp,
    /// Producer timestamp of the event this row reflects.
    pub updated_at: Timestamp,
}

impl OrderRecord {
    /// Build the initial row inserted at submit time, before the broker has
    /// echoed the order back in a diff.
    #[must_use]
    pub fn pending(
        order_id: OrderId,
        portfolio_id: PortfolioId,
        symbol: Symbol,
        direction: Direction,
        offset: Offset,
        volume: u32,
        limit_price: Option<Decimal>,
        submitted_at: Timestamp,
    ) -> Self {
        Self {
            order_id,
            exchange_order_id: None,
            portfolio_id,
            symbol,
            direction,
            offset,
            status: OrderStatus::Alive,
            volume_orign: volume,
            volume_left: volume,
            filled_quantity: 0,
            limit_price,
            trade_price: None,
            insert_date_time: submitted_at,
            updated_at: submitted_at,
        }
    }

    /// Build the full-state row an order update maps to.
    #[must_use]
    pub fn from_update(update: &OrderUpdate) -> Self {
        Self {
            order_id: update.order_id.clone(),
            exchange_order_id: update.exchange_order_id.clone(),
            portfolio_id: update.portfolio_id.clone(),
            symbol: update.symbol.clone(),
            direction: update.direction,
            offset: update.offset,
            status: update.status,
            volume_orign: update.volume_orign,
            volume_left: update.volume_left,
            filled_quantity: update.filled_quantity,
            limit_price: update.limit_price,
            trade_price: update.trade_price,
            insert_date_time: update.insert_date_time,
            updated_at: update.timestamp,
        }
    }
}

/// Append-only log row for one order event.
///
/// The store assigns the sequence number on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEventRecord {
    /// The order this event belongs to.
    pub order_id: OrderId,
    /// Owning portfolio.
    pub portfolio_id: PortfolioId,
    /// Classification tag.
    pub event_type: OrderEventKind,
    /// Full serialized event snapshot.
    pub payload: serde_json::Value,
    /// Producer timestamp of the event.
    pub created_at: Timestamp,
}

/// Port for the relational order store.
#[async_trait]
pub trait OrderStorePort: Send + Sync {
    /// Insert or fully overwrite the current-state row for an order.
    /// Replaying the same row twice must leave the table unchanged.
    async fn upsert_order(&self, record: OrderRecord) -> Result<(), StoreError>;

    /// Read the current-state row for an order, `None` when unknown.
    async fn get_order(&self, order_id: &OrderId) -> Result<Option<OrderRecord>, StoreError>;

    /// Append one row to the order-event log and return its store-assigned
    /// sequence. Not idempotent: redelivery produces a duplicate row, an
    /// accepted trade-off (audit completeness over strict dedup) since the
    /// bus carries no stable delivery identifier.
    async fn append_event(&self, record: OrderEventRecord) -> Result<u64, StoreError>;
}

/// Port for the key-value cache with per-entry expiry.
#[async_trait]
pub trait KvCachePort: Send + Sync {
    /// Overwrite an entry and reset its expiry window.
    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration)
    -> Result<(), StoreError>;

    /// Read an entry, `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
}

/// Cache key for a position entry.
#[must_use]
pub fn position_cache_key(portfolio_id: &PortfolioId, symbol: &Symbol) -> String {
    format!("position:{portfolio_id}:{symbol}")
}

/// Cache key for an account entry.
#[must_use]
pub fn account_cache_key(portfolio_id: &PortfolioId) -> String {
    format!("account:{portfolio_id}")
}
