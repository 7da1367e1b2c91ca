//! Broker reconnect configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::services::ReconnectConfig;

/// Reconnect backoff settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectSettings {
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Cap on the retry delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Exponential multiplier per attempt.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Jitter fraction.
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
    /// Maximum attempts before giving up (0 = unlimited).
    #[serde(default)]
    pub max_attempts: u32,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter_factor: default_jitter_factor(),
            max_attempts: 0,
        }
    }
}

impl ReconnectSettings {
    /// Convert to the policy configuration the monitor consumes.
    #[must_use]
    pub const fn to_policy_config(&self) -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            multiplier: self.multiplier,
            jitter_factor: self.jitter_factor,
            max_attempts: self.max_attempts,
        }
    }
}

const fn default_initial_delay_ms() -> u64 {
    1_000
}

const fn default_max_delay_ms() -> u64 {
    60_000
}

const fn default_multiplier() -> f64 {
    2.0
}

const fn default_jitter_factor() -> f64 {
    0.1
}
