//! Prometheus metrics for the broker bridge.
//!
//! Covers the diff pipeline (events classified and published), order routing
//! (submissions, cancels, close splits), and persistence (stale updates).

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Configuration for the metrics exporter.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Address to bind the metrics HTTP listener.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9090".parse().expect("valid default address"),
        }
    }
}

impl MetricsConfig {
    /// Create a metrics configuration with a custom address.
    #[must_use]
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self { listen_addr: addr }
    }
}

/// Error type for metrics operations.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Failed to install the metrics exporter.
    #[error("metrics installation error: {0}")]
    Installation(String),
}

/// Initialize the Prometheus metrics exporter.
///
/// Starts an HTTP server exposing metrics at `/metrics`.
///
/// # Errors
///
/// Returns an error if the exporter fails to start, e.g. the port is in use.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(config.listen_addr)
        .install()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    tracing::info!(
        addr = %config.listen_addr,
        "Prometheus metrics exporter started"
    );

    Ok(())
}

// ============================================================================
// Diff Pipeline Metrics
// ============================================================================

/// Record a classified order lifecycle event.
///
/// # Arguments
///
/// * `kind` - Event kind wire name (e.g., `"PARTIAL_FILL"`, `"CANCELLED"`)
pub fn record_order_event(kind: &str) {
    counter!(
        "order_events_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record a broker snapshot dropped before classification.
///
/// # Arguments
///
/// * `reason` - Drop reason (e.g., `"malformed"`, `"volume_regression"`)
pub fn record_dropped_snapshot(reason: &str) {
    counter!(
        "dropped_snapshots_total",
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record an event published to the bus.
///
/// # Arguments
///
/// * `topic` - Destination topic (e.g., `"order.updates"`)
pub fn record_event_published(topic: &str) {
    counter!(
        "events_published_total",
        "topic" => topic.to_string()
    )
    .increment(1);
}

/// Record a failed bus publish.
///
/// # Arguments
///
/// * `topic` - Destination topic
pub fn record_publish_failure(topic: &str) {
    counter!(
        "publish_failures_total",
        "topic" => topic.to_string()
    )
    .increment(1);
}

// ============================================================================
// Order Routing Metrics
// ============================================================================

/// Record an order submission attempt.
///
/// # Arguments
///
/// * `offset` - Position effect wire name (e.g., `"OPEN"`, `"CLOSETODAY"`)
/// * `status` - Outcome (e.g., `"submitted"`, `"rejected"`, `"invalid"`)
pub fn record_order_submission(offset: &str, status: &str) {
    counter!(
        "order_submissions_total",
        "offset" => offset.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a cancel request forwarded to the broker.
///
/// # Arguments
///
/// * `status` - Outcome (e.g., `"forwarded"`, `"rejected"`, `"invalid"`)
pub fn record_order_cancel(status: &str) {
    counter!(
        "order_cancels_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a CLOSETODAY split of one close order.
///
/// # Arguments
///
/// * `insufficient` - Whether cached availability failed to cover the volume
pub fn record_close_split(insufficient: bool) {
    counter!(
        "close_splits_total",
        "insufficient" => insufficient.to_string()
    )
    .increment(1);
}

// ============================================================================
// Persistence Metrics
// ============================================================================

/// Record a state write skipped by the timestamp ordering guard.
pub fn record_stale_update() {
    counter!("stale_updates_skipped_total").increment(1);
}

// ============================================================================
// Task Supervision Metrics
// ============================================================================

/// Record a pipeline task restart after failure.
///
/// # Arguments
///
/// * `task` - Task name (e.g., `"monitor"`, `"request_consumer"`)
pub fn record_task_restart(task: &str) {
    counter!(
        "task_restarts_total",
        "task" => task.to_string()
    )
    .increment(1);
}
