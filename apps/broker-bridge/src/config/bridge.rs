//! Core bridge settings.

use serde::{Deserialize, Serialize};

/// Settings for the bridge itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Portfolio this process trades and reports for.
    #[serde(default = "default_portfolio_id")]
    pub portfolio_id: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            portfolio_id: default_portfolio_id(),
        }
    }
}

fn default_portfolio_id() -> String {
    "default".to_string()
}
