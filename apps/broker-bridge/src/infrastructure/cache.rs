//! In-process position breakdown cache.
//!
//! Written by the diff monitor on every diff, read synchronously by the
//! order router when splitting closes. Entries may lag the broker by one
//! in-flight diff; the split rules treat that as acceptable staleness and
//! flag any shortfall instead of failing.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::application::ports::BreakdownCache;
use crate::domain::position::PositionBreakdown;
use crate::domain::shared::{PortfolioId, Symbol};

/// `RwLock`-backed implementation of `BreakdownCache`.
#[derive(Debug, Default)]
pub struct LockedBreakdownCache {
    entries: RwLock<HashMap<(PortfolioId, Symbol), PositionBreakdown>>,
}

impl LockedBreakdownCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl BreakdownCache for LockedBreakdownCache {
    fn get(&self, portfolio_id: &PortfolioId, symbol: &Symbol) -> Option<PositionBreakdown> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(portfolio_id.clone(), symbol.clone()))
            .copied()
    }

    fn set(&self, portfolio_id: &PortfolioId, symbol: &Symbol, breakdown: PositionBreakdown) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert((portfolio_id.clone(), symbol.clone()), breakdown);
    }
}
