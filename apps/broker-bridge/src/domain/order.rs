//! Order entities: direction, offset, status, and broker order snapshots.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::shared::{ExchangeOrderId, OrderId, Symbol, Timestamp};

/// Order direction (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    /// Buy order.
    Buy,
    /// Sell order.
    Sell,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Position effect of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Offset {
    /// Open a new position.
    Open,
    /// Close an existing position (historical on split-rule exchanges).
    Close,
    /// Close a position opened today (split-rule exchanges only).
    #[serde(rename = "CLOSETODAY")]
    CloseToday,
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Close => write!(f, "CLOSE"),
            Self::CloseToday => write!(f, "CLOSETODAY"),
        }
    }
}

/// Broker-side order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order is working at the exchange.
    Alive,
    /// Order reached a terminal state (filled, cancelled, or rejected).
    Finished,
}

impl OrderStatus {
    /// Whether this status is terminal.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alive => write!(f, "ALIVE"),
            Self::Finished => write!(f, "FINISHED"),
        }
    }
}

/// Full broker-side view of one order, as carried in a state diff.
///
/// This is the raw material the change detector classifies; it is a complete
/// post-change value, never a delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    /// Caller-assigned order id.
    pub order_id: OrderId,
    /// Exchange-assigned id, absent until the exchange accepts the order.
    #[serde(default)]
    pub exchange_order_id: Option<ExchangeOrderId>,
    /// Contract symbol.
    pub symbol: Symbol,
    /// Buy or sell.
    pub direction: Direction,
    /// Position effect.
    pub offset: Offset,
    /// Originally requested volume.
    pub volume_orign: u32,
    /// Volume still unfilled.
    pub volume_left: u32,
    /// Limit price; `None` means a market order.
    #[serde(default)]
    pub limit_price: Option<Decimal>,
    /// Current broker status.
    pub status: OrderStatus,
    /// No further fills are possible.
    pub is_dead: bool,
    /// The broker flagged this order as errored (rejection).
    #[serde(default)]
    pub is_error: bool,
    /// Volume-weighted average fill price, if any fill happened.
    #[serde(default)]
    pub trade_price: Option<Decimal>,
    /// When the order was inserted at the broker.
    pub insert_date_time: Timestamp,
}

impl OrderSnapshot {
    /// Quantity filled so far.
    #[must_use]
    pub const fn filled_quantity(&self) -> u32 {
        self.volume_orign - self.volume_left
    }

    /// Validate the snapshot invariants.
    ///
    /// `volume_left` must not exceed `volume_orign`, and a dead order must be
    /// in a terminal status. Snapshots violating these cannot be classified.
    #[must_use]
    pub const fn is_well_formed(&self) -> bool {
        self.volume_left <= self.volume_orign && (!self.is_dead || self.status.is_terminal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot() -> OrderSnapshot {
        OrderSnapshot {
            order_id: OrderId::new("ord-1"),
            exchange_order_id: None,
            symbol: Symbol::new("SHFE.rb2505"),
            direction: Direction::Buy,
            offset: Offset::Open,
            volume_orign: 10,
            volume_left: 10,
            limit_price: Some(dec!(3500)),
            status: OrderStatus::Alive,
            is_dead: false,
            is_error: false,
            trade_price: None,
            insert_date_time: Timestamp::now(),
        }
    }

    #[test]
    fn filled_quantity_is_orign_minus_left() {
        let mut snap = snapshot();
        snap.volume_left = 4;
        assert_eq!(snap.filled_quantity(), 6);
    }

    #[test]
    fn well_formed_checks_volume_bounds() {
        let mut snap = snapshot();
        assert!(snap.is_well_formed());
        snap.volume_left = 11;
        assert!(!snap.is_well_formed());
    }

    #[test]
    fn dead_order_must_be_finished() {
        let mut snap = snapshot();
        snap.is_dead = true;
        assert!(!snap.is_well_formed());
        snap.status = OrderStatus::Finished;
        assert!(snap.is_well_formed());
    }

    #[test]
    fn offset_serde_uses_wire_names() {
        assert_eq!(
            serde_json::to_string(&Offset::CloseToday).unwrap(),
            "\"CLOSETODAY\""
        );
    }
}
