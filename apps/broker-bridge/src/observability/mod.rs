//! Observability: Prometheus metrics export and structured logging.

mod metrics;
mod tracing;

pub use metrics::{
    MetricsConfig, MetricsError, init_metrics, record_close_split, record_dropped_snapshot,
    record_event_published, record_order_cancel, record_order_event, record_order_submission,
    record_publish_failure, record_stale_update, record_task_restart,
};
pub use tracing::{TracingConfig, TracingError, init_tracing};
