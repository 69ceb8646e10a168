//! Application layer - Use cases and port definitions.

/// Port definitions for transports.
pub mod ports;

/// Monitor service wiring session events to the status model and engine.
pub mod services;
