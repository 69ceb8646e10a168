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
        clippy::items_after_statements
    )
)]

//! Network Monitor - Streaming Status Watcher
//!
//! A long-lived client that subscribes to a remote status feed over a
//! TLS WebSocket, keeps an in-memory model of entity statuses, and
//! raises alerts when an entity stays degraded past a configured
//! threshold. State is seeded once at startup from an HTTPS snapshot,
//! then maintained purely from stream deltas.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core monitoring logic with no I/O
//!   - `status`: Status model, records, transitions
//!   - `alert`: Threshold rule evaluation engine
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Transport abstraction the session runs against
//!   - `services`: Monitor orchestration (model + engine + tick)
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `stream`: TLS WebSocket transport, session manager, codec, backoff
//!   - `seed`: HTTPS snapshot fetcher
//!   - `config`: Environment-driven configuration
//!   - `telemetry`: Tracing initialization
//!
//! # Data Flow
//!
//! ```text
//! HTTPS snapshot ──► seed ──┐
//!                           ▼
//! WSS feed ──► Session ──► Status ──► Alert ──► MonitorEvents
//!              Manager     Model     Engine
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core monitoring types with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::alert::{AlertEngine, AlertEvent, AlertRule, AlertState};
pub use domain::status::{
    ApplyOutcome, EntityId, Status, StatusModel, StatusModelError, StatusRecord, StatusUpdate,
    Transition,
};

// Application ports and services
pub use application::ports::{Frame, StreamTransport, TransportConnector, TransportError};
pub use application::services::{MonitorEvent, MonitorService, MonitorServiceConfig};

// Infrastructure config
pub use infrastructure::config::{
    AlertSettings, ConfigError, Credentials, MonitorConfig, SeedSettings, StreamSettings,
};

// Streaming stack (for integration tests)
pub use infrastructure::stream::{
    Backoff, BackoffConfig, CodecError, FeedCodec, KeepaliveConfig, SessionConfig, SessionError,
    SessionEvent, SessionManager, SessionState, WsConnector, WsConnectorConfig,
};

// Seed fetcher (for integration tests)
pub use infrastructure::seed::{FetchError, SeedConfig, SeedFetcher, parse_snapshot};

// Telemetry
pub use infrastructure::telemetry::init as init_telemetry;
