//! Account snapshot, overwritten wholesale on every account change.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Full account state for one portfolio.
///
/// Always replaced as a unit; partial updates are never applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Total account balance.
    pub balance: Decimal,
    /// Funds available for new positions.
    pub available: Decimal,
    /// Margin currently in use.
    pub margin: Decimal,
    /// Unrealized profit from open positions, marked to last price.
    pub float_profit: Decimal,
    /// Position profit (settlement-price based).
    pub position_profit: Decimal,
    /// Margin usage ratio.
    pub risk_ratio: Decimal,
}
