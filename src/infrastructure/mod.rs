//! Infrastructure layer - Adapters and external integrations.

/// Environment-driven configuration.
pub mod config;

/// Seed bootstrap fetcher (HTTPS).
pub mod seed;

/// Streaming transport, session management, and wire codec.
pub mod stream;

/// Tracing initialization.
pub mod telemetry;
