//! Position breakdown: long/short split into today and historical lots.

use serde::{Deserialize, Serialize};

use crate::domain::order::Direction;

/// Decomposition of a position into long/short and today/historical parts.
///
/// This is the value the order router consults when splitting a close order
/// on exchanges that distinguish today's lots from prior-day lots. All
/// quantities are non-negative contract counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionBreakdown {
    /// Long lots opened today.
    pub pos_long_today: u32,
    /// Long lots carried from prior sessions.
    pub pos_long_his: u32,
    /// Short lots opened today.
    pub pos_short_today: u32,
    /// Short lots carried from prior sessions.
    pub pos_short_his: u32,
}

impl PositionBreakdown {
    /// An empty (flat) breakdown.
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            pos_long_today: 0,
            pos_long_his: 0,
            pos_short_today: 0,
            pos_short_his: 0,
        }
    }

    /// Total long lots.
    #[must_use]
    pub const fn pos_long(&self) -> u32 {
        self.pos_long_today + self.pos_long_his
    }

    /// Total short lots.
    #[must_use]
    pub const fn pos_short(&self) -> u32 {
        self.pos_short_today + self.pos_short_his
    }

    /// Net position: long minus short.
    #[must_use]
    pub const fn net(&self) -> i64 {
        self.pos_long() as i64 - self.pos_short() as i64
    }

    /// The (today, historical) quantities a close order in `direction` would
    /// consume: a SELL close consumes the long side, a BUY close the short
    /// side.
    #[must_use]
    pub const fn closable(&self, direction: Direction) -> (u32, u32) {
        match direction {
            Direction::Sell => (self.pos_long_today, self.pos_long_his),
            Direction::Buy => (self.pos_short_today, self.pos_short_his),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breakdown() -> PositionBreakdown {
        PositionBreakdown {
            pos_long_today: 5,
            pos_long_his: 10,
            pos_short_today: 2,
            pos_short_his: 1,
        }
    }

    #[test]
    fn net_is_long_minus_short() {
        assert_eq!(breakdown().net(), 12);
        assert_eq!(PositionBreakdown::zero().net(), 0);
    }

    #[test]
    fn sell_close_consumes_long_side() {
        assert_eq!(breakdown().closable(Direction::Sell), (5, 10));
    }

    #[test]
    fn buy_close_consumes_short_side() {
        assert_eq!(breakdown().closable(Direction::Buy), (2, 1));
    }

    #[test]
    fn zero_has_no_net_position() {
        assert_eq!(PositionBreakdown::zero().net(), 0);
    }
}
