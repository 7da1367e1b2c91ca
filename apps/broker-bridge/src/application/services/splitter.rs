//! CLOSETODAY split rules for exchanges that distinguish today's lots.
//!
//! SHFE and INE require a close against today's opened position to be
//! submitted as a distinct CLOSETODAY order. A single logical close is
//! rewritten into up to two sub-orders using the cached position breakdown:
//! today-side first, then the historical side. When the cached availability
//! does not cover the requested volume, the uncovered remainder is still
//! routed to the historical side and the plan is flagged; rejecting would
//! risk leaving a hedge unclosed.

use crate::application::dto::SubmitPayload;
use crate::domain::order::Offset;
use crate::domain::position::PositionBreakdown;
use crate::domain::shared::{OrderId, Symbol};

/// Exchanges whose close orders must distinguish today from historical lots.
pub const CLOSETODAY_EXCHANGES: [&str; 2] = ["SHFE", "INE"];

/// Whether a symbol's exchange requires today/historical close distinction.
#[must_use]
pub fn requires_closetoday(symbol: &Symbol) -> bool {
    CLOSETODAY_EXCHANGES.contains(&symbol.exchange())
}

/// One leg of a split close order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubOrder {
    /// Deterministic derived order id.
    pub order_id: OrderId,
    /// CLOSETODAY for the today leg, CLOSE for the historical leg.
    pub offset: Offset,
    /// Contracts this leg closes.
    pub volume: u32,
}

/// The rewrite of one logical close order into exchange-compliant legs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPlan {
    /// Legs in submission order: today leg first when present.
    pub sub_orders: Vec<SubOrder>,
    /// Volume backed by cached availability.
    pub covered_volume: u32,
    /// True when the cached breakdown did not cover the full request and the
    /// remainder was force-routed to the historical side.
    pub insufficient: bool,
}

/// Split a close request against the cached breakdown.
///
/// Greedy: consume today-side lots first up to availability, then route the
/// entire remainder to the historical side. Sub-order ids derive
/// deterministically from the base id, so redelivery of the same request
/// produces identical legs.
#[must_use]
pub fn split_close(payload: &SubmitPayload, breakdown: PositionBreakdown) -> SplitPlan {
    let (available_today, available_his) = breakdown.closable(payload.direction);

    let today_volume = payload.volume.min(available_today);
    let remainder = payload.volume - today_volume;
    let covered_volume = today_volume + remainder.min(available_his);
    let insufficient = covered_volume < payload.volume;

    let mut sub_orders = Vec::with_capacity(2);
    if today_volume > 0 {
        sub_orders.push(SubOrder {
            order_id: payload.order_id.derive_closetoday(),
            offset: Offset::CloseToday,
            volume: today_volume,
        });
    }
    if remainder > 0 {
        sub_orders.push(SubOrder {
            order_id: payload.order_id.derive_close(),
            offset: Offset::Close,
            volume: remainder,
        });
    }

    SplitPlan {
        sub_orders,
        covered_volume,
        insufficient,
    }
}
