//! Domain layer - Core monitoring types with no I/O dependencies.

/// Alert evaluation engine and alert state tracking.
pub mod alert;

/// Status model: monitored entities and their update history.
pub mod status;
