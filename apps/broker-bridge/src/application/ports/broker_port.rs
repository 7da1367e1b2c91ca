//! Broker connection ports (driven).
//!
//! Two seams to the long-lived broker connection: a command side for
//! submitting and cancelling orders, and a diff side exposing the blocking
//! "wait for next state change" primitive as an async call.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::account::AccountSnapshot;
use crate::domain::order::{Direction, Offset, OrderSnapshot};
use crate::domain::position::PositionBreakdown;
use crate::domain::shared::{OrderId, Symbol};

/// A command to place one order at the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerOrder {
    /// Caller-assigned order id, echoed back in diffs.
    pub order_id: OrderId,
    /// Contract symbol.
    pub symbol: Symbol,
    /// Buy or sell.
    pub direction: Direction,
    /// Position effect.
    pub offset: Offset,
    /// Contracts to trade.
    pub volume: u32,
    /// Limit price; `None` places a market order.
    pub limit_price: Option<Decimal>,
}

/// One state change notification from the broker connection.
///
/// Every entity present carries its full post-change state, never a delta.
/// The orders map holds only the orders whose state changed since the
/// previous poll; an absent order is unchanged. The positions map, when
/// non-empty, reports the complete position book, so a symbol missing from
/// it has been closed out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrokerDiff {
    /// Orders whose state changed, by order id.
    pub orders: HashMap<OrderId, OrderSnapshot>,
    /// The full position book, empty when this diff carries no position
    /// information.
    pub positions: HashMap<Symbol, PositionBreakdown>,
    /// Account state, when the connection reports it.
    pub account: Option<AccountSnapshot>,
}

/// Broker connection error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BrokerError {
    /// Connection to the broker is down or was lost mid-call.
    #[error("Broker connection error: {message}")]
    ConnectionError {
        /// Error details.
        message: String,
    },

    /// The broker refused the command before acceptance.
    #[error("Broker rejected command: {reason}")]
    CommandRejected {
        /// Rejection reason.
        reason: String,
    },

    /// The connection was shut down and yields no further diffs.
    #[error("Broker connection closed")]
    Closed,
}

/// Command side of the broker connection.
#[async_trait]
pub trait BrokerCommandPort: Send + Sync {
    /// Submit one order. Resolves once the connection has accepted the
    /// command; fills and rejections arrive later through the diff side.
    async fn submit(&self, order: BrokerOrder) -> Result<(), BrokerError>;

    /// Request cancellation of an order. Unknown or already-terminal orders
    /// are the broker's no-op to report, not ours to pre-validate.
    async fn cancel(&self, order_id: &OrderId) -> Result<(), BrokerError>;
}

/// Diff-poll side of the broker connection.
///
/// The returned future suspends until the broker state changes; the sequence
/// of diffs is infinite and non-restartable for the life of the connection.
#[async_trait]
pub trait BrokerDiffPort: Send + Sync {
    /// Wait for and return the next state snapshot.
    async fn next_diff(&self) -> Result<BrokerDiff, BrokerError>;
}
