//! Long-running services and the pure policies they are built from.

pub mod change_detector;
pub mod monitor;
pub mod persistence;
pub mod reconnect;
pub mod request_consumer;
pub mod splitter;

pub use change_detector::ChangeDetector;
pub use monitor::DiffMonitor;
pub use persistence::{CacheTtl, PersistenceService, PersistenceWorker};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use request_consumer::RequestConsumer;
pub use splitter::{CLOSETODAY_EXCHANGES, SplitPlan, SubOrder, requires_closetoday, split_close};
