//! Broker Bridge Binary
//!
//! Starts the bridge against the simulated broker connection.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin broker-bridge
//! ```
//!
//! # Environment Variables
//!
//! ## Optional
//! - `BRIDGE_CONFIG`: Path to the YAML config file (default: config.yaml)
//! - `BRIDGE_PORTFOLIO_ID`: Portfolio identifier (via config interpolation)
//! - `RUST_LOG`: Log level (default: from config, usually info)

use std::sync::Arc;
use std::time::Duration;

use broker_bridge::application::services::{
    CacheTtl, DiffMonitor, PersistenceService, PersistenceWorker, RequestConsumer,
};
use broker_bridge::application::use_cases::{CancelOrderUseCase, RouteOrderUseCase};
use broker_bridge::config::{Config, ConfigError, load_config};
use broker_bridge::domain::shared::PortfolioId;
use broker_bridge::infrastructure::{
    InMemoryBus, InMemoryKvCache, InMemoryOrderStore, LockedBreakdownCache, SimBroker,
};
use broker_bridge::observability::{MetricsConfig, TracingConfig, init_metrics, init_tracing};
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Grace period for in-flight deliveries after cancellation.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Concrete type alias for the order routing use case.
type ConcreteRouteOrderUseCase =
    RouteOrderUseCase<SimBroker, LockedBreakdownCache, InMemoryOrderStore>;

/// Concrete type alias for the cancel use case.
type ConcreteCancelOrderUseCase = CancelOrderUseCase<SimBroker>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_dotenv();

    let (config, config_fallback) = resolve_config()?;

    init_tracing(&TracingConfig {
        default_filter: config.observability.logging.level.clone(),
        json: config.observability.logging.format == "json",
    })?;

    tracing::info!("Starting broker bridge");
    if let Some(path) = &config_fallback {
        tracing::warn!(path = %path, "Config file not found, using built-in defaults");
    }
    log_config(&config);

    if config.observability.metrics.enabled {
        let listen_addr = config.observability.metrics.listen_addr.parse()?;
        init_metrics(&MetricsConfig { listen_addr })?;
        tracing::info!(%listen_addr, "Prometheus exporter started");
    }

    let broker = Arc::new(SimBroker::new());
    let bus = Arc::new(InMemoryBus::with_capacity(config.bus.capacity));
    let breakdowns = Arc::new(LockedBreakdownCache::new());
    let order_store = Arc::new(InMemoryOrderStore::new());
    let kv_cache = Arc::new(InMemoryKvCache::new());

    let shutdown_token = CancellationToken::new();
    let portfolio_id = PortfolioId::new(config.bridge.portfolio_id.clone());

    // Consumers bind their topics when their run loops start; the monitor
    // publishes nothing until the broker produces a diff, which requires a
    // command to have flowed through an already-bound request topic.
    let persistence_handle = start_persistence_worker(
        &config,
        Arc::clone(&bus),
        Arc::clone(&order_store),
        Arc::clone(&kv_cache),
        shutdown_token.clone(),
    );

    let consumer_handle = start_request_consumer(
        Arc::clone(&bus),
        Arc::clone(&broker),
        Arc::clone(&breakdowns),
        Arc::clone(&order_store),
        shutdown_token.clone(),
    );

    let monitor = DiffMonitor::new(
        portfolio_id,
        Arc::clone(&broker),
        Arc::clone(&bus),
        Arc::clone(&breakdowns),
        config.reconnect.to_policy_config(),
        shutdown_token.clone(),
    );
    let monitor_handle = tokio::spawn(monitor.run());

    tracing::info!("Broker bridge ready");

    shutdown_signal().await;
    tracing::info!("Shutdown signal received");
    shutdown_token.cancel();

    await_shutdown(monitor_handle, consumer_handle, persistence_handle).await;

    tracing::info!("Broker bridge stopped");
    Ok(())
}

/// Load configuration, falling back to defaults when the file is absent.
///
/// Returns the config plus the missing path when the fallback was taken, so
/// the caller can log it once tracing is up.
fn resolve_config() -> Result<(Config, Option<String>), ConfigError> {
    let path = std::env::var("BRIDGE_CONFIG").ok();
    match load_config(path.as_deref()) {
        Ok(config) => Ok((config, None)),
        Err(ConfigError::ReadError { path, .. }) => Ok((Config::default(), Some(path))),
        Err(e) => Err(e),
    }
}

/// Log the effective configuration.
fn log_config(config: &Config) {
    tracing::info!(
        portfolio_id = %config.bridge.portfolio_id,
        bus_capacity = config.bus.capacity,
        position_ttl_secs = config.cache.position_ttl_secs,
        account_ttl_secs = config.cache.account_ttl_secs,
        reconnect_max_attempts = config.reconnect.max_attempts,
        metrics_enabled = config.observability.metrics.enabled,
        "Configuration loaded"
    );
}

/// Spawn the persistence worker consuming the three update topics.
fn start_persistence_worker(
    config: &Config,
    bus: Arc<InMemoryBus>,
    order_store: Arc<InMemoryOrderStore>,
    kv_cache: Arc<InMemoryKvCache>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let ttl = CacheTtl {
        position: Duration::from_secs(config.cache.position_ttl_secs),
        account: Duration::from_secs(config.cache.account_ttl_secs),
    };
    let service = PersistenceService::new(order_store, kv_cache, ttl);
    let worker = PersistenceWorker::new(bus, service, shutdown);

    tokio::spawn(async move {
        if let Err(e) = worker.run().await {
            tracing::error!(error = %e, "Persistence worker stopped with error");
        }
    })
}

/// Spawn the request consumer serving submit and cancel topics.
fn start_request_consumer(
    bus: Arc<InMemoryBus>,
    broker: Arc<SimBroker>,
    breakdowns: Arc<LockedBreakdownCache>,
    order_store: Arc<InMemoryOrderStore>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let route_order: ConcreteRouteOrderUseCase =
        RouteOrderUseCase::new(Arc::clone(&broker), breakdowns, order_store);
    let cancel_order: ConcreteCancelOrderUseCase = CancelOrderUseCase::new(broker);
    let consumer = RequestConsumer::new(bus, route_order, cancel_order, shutdown);

    tokio::spawn(async move {
        if let Err(e) = consumer.run().await {
            tracing::error!(error = %e, "Request consumer stopped with error");
        }
    })
}

/// Wait for all bridge tasks to drain, bounded by [`SHUTDOWN_TIMEOUT`].
async fn await_shutdown(
    monitor_handle: JoinHandle<()>,
    consumer_handle: JoinHandle<()>,
    persistence_handle: JoinHandle<()>,
) {
    let drain = async {
        let _ = monitor_handle.await;
        let _ = consumer_handle.await;
        let _ = persistence_handle.await;
    };

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, drain).await.is_err() {
        tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Tasks did not drain before the shutdown timeout"
        );
    }
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. Failing fast at startup is
/// preferable to a process that cannot respond to termination signals.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
