//! Domain layer: entities, value objects, and events. No I/O here.

/// Account state.
pub mod account;
/// Domain events produced by the change detector.
pub mod events;
/// Order enums and snapshots.
pub mod order;
/// Position breakdown values.
pub mod position;
/// Shared identifiers and value objects.
pub mod shared;
