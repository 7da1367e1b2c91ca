//! Cached-state expiry configuration.

use serde::{Deserialize, Serialize};

/// TTL settings for the state cache, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Expiry for position entries.
    #[serde(default = "default_ttl_secs")]
    pub position_ttl_secs: u64,
    /// Expiry for account entries.
    #[serde(default = "default_ttl_secs")]
    pub account_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            position_ttl_secs: default_ttl_secs(),
            account_ttl_secs: default_ttl_secs(),
        }
    }
}

const fn default_ttl_secs() -> u64 {
    24 * 60 * 60
}
