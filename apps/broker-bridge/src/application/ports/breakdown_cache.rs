//! Position breakdown cache port.
//!
//! The one piece of shared mutable state in the core: written by the
//! position-change path of the monitor loops, read synchronously by the order
//! router when splitting close orders. Implementations must replace entries
//! atomically so a reader never observes a half-updated breakdown; staleness
//! against the true broker position is expected and tolerated.

use crate::domain::position::PositionBreakdown;
use crate::domain::shared::{PortfolioId, Symbol};

/// Port for the breakdown cache, keyed by (portfolio, symbol).
pub trait BreakdownCache: Send + Sync {
    /// Read the most recent breakdown, `None` when never written.
    fn get(&self, portfolio_id: &PortfolioId, symbol: &Symbol) -> Option<PositionBreakdown>;

    /// Replace the breakdown for a key.
    fn set(&self, portfolio_id: &PortfolioId, symbol: &Symbol, breakdown: PositionBreakdown);
}
