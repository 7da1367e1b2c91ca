//! Domain events emitted by the change detector.
//!
//! Every event carries the full post-change entity state, never a delta, so
//! downstream consumers can replay deliveries idempotently.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::account::AccountSnapshot;
use crate::domain::order::{Direction, Offset, OrderStatus};
use crate::domain::position::PositionBreakdown;
use crate::domain::shared::{ExchangeOrderId, OrderId, PortfolioId, Symbol, Timestamp};

/// Classification of an order state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderEventKind {
    /// First sighting of a working order with no fills.
    New,
    /// `volume_left` decreased but remains above zero.
    PartialFill,
    /// `volume_left` decreased and reached zero.
    CompleteFill,
    /// Terminal transition with volume left and no error flag.
    Cancelled,
    /// Terminal transition with the broker error flag set.
    Rejected,
}

impl OrderEventKind {
    /// Whether this kind ends the order lifecycle.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::CompleteFill | Self::Cancelled | Self::Rejected)
    }

    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::PartialFill => "PARTIAL_FILL",
            Self::CompleteFill => "COMPLETE_FILL",
            Self::Cancelled => "CANCELLED",
            Self::Rejected => "REJECTED",
        }
    }
}

/// Full order state after a classified change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdate {
    /// Producer timestamp.
    pub timestamp: Timestamp,
    /// Owning portfolio.
    pub portfolio_id: PortfolioId,
    /// Caller-assigned order id.
    pub order_id: OrderId,
    /// Exchange-assigned id, if already known.
    #[serde(default)]
    pub exchange_order_id: Option<ExchangeOrderId>,
    /// Contract symbol.
    pub symbol: Symbol,
    /// Buy or sell.
    pub direction: Direction,
    /// Position effect.
    pub offset: Offset,
    /// Broker status after the change.
    pub status: OrderStatus,
    /// Classification of the change.
    pub event_type: OrderEventKind,
    /// Originally requested volume.
    pub volume_orign: u32,
    /// Volume still unfilled after the change.
    pub volume_left: u32,
    /// Volume filled so far.
    pub filled_quantity: u32,
    /// Limit price, `None` for market orders.
    #[serde(default)]
    pub limit_price: Option<Decimal>,
    /// Volume-weighted average fill price, if any.
    #[serde(default)]
    pub trade_price: Option<Decimal>,
    /// Broker insert time of the order.
    pub insert_date_time: Timestamp,
}

/// Six-way position decomposition as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownWire {
    /// Total long lots.
    pub pos_long: u32,
    /// Total short lots.
    pub pos_short: u32,
    /// Long lots opened today.
    pub pos_long_today: u32,
    /// Long lots from prior sessions.
    pub pos_long_his: u32,
    /// Short lots opened today.
    pub pos_short_today: u32,
    /// Short lots from prior sessions.
    pub pos_short_his: u32,
}

impl From<PositionBreakdown> for BreakdownWire {
    fn from(b: PositionBreakdown) -> Self {
        Self {
            pos_long: b.pos_long(),
            pos_short: b.pos_short(),
            pos_long_today: b.pos_long_today,
            pos_long_his: b.pos_long_his,
            pos_short_today: b.pos_short_today,
            pos_short_his: b.pos_short_his,
        }
    }
}

impl From<BreakdownWire> for PositionBreakdown {
    fn from(w: BreakdownWire) -> Self {
        Self {
            pos_long_today: w.pos_long_today,
            pos_long_his: w.pos_long_his,
            pos_short_today: w.pos_short_today,
            pos_short_his: w.pos_short_his,
        }
    }
}

/// Full position state after a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionUpdate {
    /// Producer timestamp.
    pub timestamp: Timestamp,
    /// Owning portfolio.
    pub portfolio_id: PortfolioId,
    /// Contract symbol.
    pub symbol: Symbol,
    /// Net position, long minus short.
    pub net_position: i64,
    /// Today/historical decomposition.
    pub breakdown: BreakdownWire,
}

/// Full account state after a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUpdate {
    /// Producer timestamp.
    pub timestamp: Timestamp,
    /// Owning portfolio.
    pub portfolio_id: PortfolioId,
    /// Account state, replaced as a whole.
    #[serde(flatten)]
    pub account: AccountSnapshot,
}

/// All events the change detector can emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainEvent {
    /// An order changed state.
    OrderUpdate(OrderUpdate),
    /// A position was observed (emitted unconditionally).
    PositionUpdate(PositionUpdate),
    /// The account changed.
    AccountUpdate(AccountUpdate),
}
