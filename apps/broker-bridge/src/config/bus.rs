//! Message bus configuration.

use serde::{Deserialize, Serialize};

/// Bus settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Per-topic channel capacity before publishers block.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

const fn default_capacity() -> usize {
    1024
}
