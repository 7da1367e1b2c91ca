//! Structured logging setup.
//!
//! A `tracing-subscriber` fmt layer with env-filter control. The filter
//! honours `RUST_LOG` when set and falls back to the configured default.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Configuration for log output.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub default_filter: String,
    /// Emit one JSON object per line instead of human-readable output.
    pub json: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            json: false,
        }
    }
}

/// Error type for tracing setup.
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    /// A subscriber was already installed in this process.
    #[error("failed to initialize tracing subscriber: {0}")]
    SubscriberError(String),
}

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if a global subscriber is already set.
pub fn init_tracing(config: &TracingConfig) -> Result<(), TracingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_filter.clone()));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    result.map_err(|e| TracingError::SubscriberError(e.to_string()))?;

    tracing::info!(json = config.json, "tracing initialized");
    Ok(())
}
