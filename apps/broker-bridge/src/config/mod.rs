//! Configuration loading with environment variable interpolation.
//!
//! Configuration comes from a YAML file; `${VAR}` and `${VAR:-default}`
//! placeholders are substituted from the process environment before parsing.

mod bridge;
mod bus;
mod cache;
mod observability;
mod reconnect;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use bridge::BridgeConfig;
pub use bus::BusConfig;
pub use cache::CacheConfig;
pub use observability::{LoggingConfig, MetricsSettings, ObservabilityConfig};
pub use reconnect::ReconnectSettings;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Bridge settings.
    #[serde(default)]
    pub bridge: BridgeConfig,
    /// Bus settings.
    #[serde(default)]
    pub bus: BusConfig,
    /// Cache TTL settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Reconnect backoff settings.
    #[serde(default)]
    pub reconnect: ReconnectSettings,
    /// Observability settings.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Load configuration from a YAML file with environment variable
/// interpolation.
///
/// # Arguments
///
/// * `path` - Optional path to the config file. Defaults to "config.yaml".
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or("config.yaml");

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_string(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string (useful for testing).
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = serde_yaml_bw::from_str(&interpolated)?;
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax.
#[allow(clippy::expect_used)] // Regex is compile-time constant; expect() is safe here
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let mut result = input.to_string();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    for cap in re.captures_iter(input) {
        let Some(full_match) = cap.get(0) else {
            continue;
        };
        let Some(var_match) = cap.get(1) else {
            continue;
        };
        let full_match = full_match.as_str();
        let var_name = var_match.as_str();
        let default_value = cap.get(2).map(|m| m.as_str());

        let value = match std::env::var(var_name) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.map_or_else(String::new, str::to_string),
        };

        result = result.replace(full_match, &value);
    }

    result
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.bridge.portfolio_id.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "bridge.portfolio_id must not be empty".to_string(),
        ));
    }

    if config.bus.capacity == 0 {
        return Err(ConfigError::ValidationError(
            "bus.capacity must be positive".to_string(),
        ));
    }

    if config.cache.position_ttl_secs == 0 || config.cache.account_ttl_secs == 0 {
        return Err(ConfigError::ValidationError(
            "cache TTLs must be positive".to_string(),
        ));
    }

    if config.reconnect.multiplier < 1.0 {
        return Err(ConfigError::ValidationError(
            "reconnect.multiplier must be at least 1.0".to_string(),
        ));
    }

    if config.reconnect.jitter_factor < 0.0 || config.reconnect.jitter_factor > 1.0 {
        return Err(ConfigError::ValidationError(
            "reconnect.jitter_factor must be between 0.0 and 1.0".to_string(),
        ));
    }

    if config.observability.metrics.enabled
        && config
            .observability
            .metrics
            .listen_addr
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        return Err(ConfigError::ValidationError(format!(
            "observability.metrics.listen_addr '{}' is not a socket address",
            config.observability.metrics.listen_addr
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.bridge.portfolio_id, "default");
        assert_eq!(config.bus.capacity, 1024);
        assert_eq!(config.cache.position_ttl_secs, 86_400);
        assert_eq!(config.reconnect.initial_delay_ms, 1_000);
        assert!(!config.observability.metrics.enabled);
    }

    #[test]
    fn minimal_yaml_loads_with_defaults() {
        let yaml = r"
bridge:
  portfolio_id: pf-test
";
        let config = load_config_from_string(yaml).unwrap();
        assert_eq!(config.bridge.portfolio_id, "pf-test");
        assert_eq!(config.bus.capacity, 1024);
    }

    #[test]
    fn env_var_default_syntax_is_interpolated() {
        let interpolated = interpolate_env_vars("portfolio_id: ${THIS_VAR_IS_UNSET:-fallback}");
        assert_eq!(interpolated, "portfolio_id: fallback");
    }

    #[test]
    fn unset_var_without_default_becomes_empty() {
        let interpolated = interpolate_env_vars("portfolio_id: '${THIS_VAR_IS_UNSET}'");
        assert_eq!(interpolated, "portfolio_id: ''");
    }

    #[test]
    fn empty_portfolio_id_is_rejected() {
        let yaml = r"
bridge:
  portfolio_id: ''
";
        assert!(matches!(
            load_config_from_string(yaml),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn zero_bus_capacity_is_rejected() {
        let yaml = r"
bus:
  capacity: 0
";
        assert!(matches!(
            load_config_from_string(yaml),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn bad_metrics_addr_is_rejected() {
        let yaml = r"
observability:
  metrics:
    enabled: true
    listen_addr: not-an-addr
";
        assert!(matches!(
            load_config_from_string(yaml),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn reconnect_settings_convert_to_policy_config() {
        let settings = ReconnectSettings::default();
        let policy = settings.to_policy_config();
        assert_eq!(policy.initial_delay, std::time::Duration::from_millis(1_000));
        assert_eq!(policy.max_delay, std::time::Duration::from_millis(60_000));
    }
}
