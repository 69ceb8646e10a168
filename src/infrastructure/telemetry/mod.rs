//! Tracing Integration
//!
//! Structured logging via `tracing` with an env-filtered fmt subscriber.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Log filter (default: `network_monitor=info`)
//!
//! # Usage
//!
//! ```ignore
//! use network_monitor::infrastructure::telemetry;
//!
//! // Initialize once at startup.
//! telemetry::init();
//!
//! tracing::info!("Monitor starting");
//! ```

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize the tracing subscriber.
///
/// Call once at startup; a second call panics inside `tracing-subscriber`,
/// so tests should use their own ad-hoc subscribers instead.
#[allow(clippy::expect_used)]
pub fn init() {
    let env_filter = EnvFilter::from_default_env()
        .add_directive(
            "network_monitor=info"
                .parse()
                .expect("static directive 'network_monitor=info' is valid"),
        )
        .add_directive(
            "tungstenite=warn"
                .parse()
                .expect("static directive 'tungstenite=warn' is valid"),
        )
        .add_directive(
            "hyper=warn"
                .parse()
                .expect("static directive 'hyper=warn' is valid"),
        );

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
