// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Broker Bridge - Rust Core Library
//!
//! Bridges a diff-polled futures broker connection to a message-bus
//! pipeline: broker state changes become typed domain events on outbound
//! topics, and inbound submit/cancel requests are routed back to the broker
//! with exchange-specific close splitting.
//!
//! # Architecture (Clean Architecture + Hexagonal)
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: Orders, positions, accounts, and the events derived from
//!   them. No I/O.
//!
//! - **Application**: Ports, use cases, and the long-running services
//!   - `ports`: `BrokerDiffPort`, `BrokerCommandPort`, bus and store ports
//!   - `use_cases`: `RouteOrder` (with CLOSETODAY splitting), `CancelOrder`
//!   - `services`: change detection, the diff monitor, request consumption,
//!     and persistence handlers
//!
//! - **Infrastructure**: Adapters (implementations)
//!   - `broker`: simulated broker connection
//!   - `bus`: in-process direct-exchange bus
//!   - `persistence`: in-memory order store and TTL cache

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Clean Architecture Layers
// =============================================================================

/// Domain layer - Core business logic with no external dependencies.
pub mod domain;

/// Application layer - Use cases, services, and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

/// Configuration loading and validation.
pub mod config;

/// Metrics export and structured logging.
pub mod observability;

// =============================================================================
// Re-exports
// =============================================================================

pub use domain::events::{DomainEvent, OrderEventKind, OrderUpdate, PositionUpdate};
pub use domain::order::{Direction, Offset, OrderSnapshot, OrderStatus};
pub use domain::position::PositionBreakdown;
pub use domain::shared::{OrderId, PortfolioId, Symbol, Timestamp};

pub use application::services::{ChangeDetector, DiffMonitor, split_close};
pub use application::use_cases::{CancelOrderUseCase, RouteOrderUseCase};

pub use config::{Config, load_config};
