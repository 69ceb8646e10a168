//! Network Monitor Binary
//!
//! Starts the streaming status monitor.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin network-monitor
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `NM_STREAM_URL`: `wss://` status feed endpoint
//! - `NM_SEED_URL`: `https://` snapshot endpoint
//! - `NM_USERNAME`: Feed account name
//! - `NM_PASSWORD`: Feed account secret
//! - `NM_TOPICS`: Comma-separated entity ids to subscribe to
//!
//! ## Optional
//! - `NM_ALERT_THRESHOLD_SECS`: Degraded duration before raising (default: 300)
//! - `NM_DEGRADED_STATUSES`: Statuses counted as degraded (default: Degraded,Down,Unknown)
//! - `NM_TICK_INTERVAL_SECS`: Evaluation tick period (default: 5)
//! - `NM_MAX_QUIET_SECS`: Silence before an entity turns Unknown (default: 120)
//! - `NM_TLS_VERIFY_PEER`: Verify server certificates (default: true)
//! - `NM_MAX_RECONNECT_ATTEMPTS`: Reconnect attempt limit, 0 = unlimited (default: 0)
//! - `RUST_LOG`: Log filter (default: info)

use std::sync::Arc;

use anyhow::Context;
use network_monitor::infrastructure::telemetry;
use network_monitor::{
    AlertEngine, MonitorConfig, MonitorEvent, MonitorService, MonitorServiceConfig, SeedFetcher,
    SessionEvent, SessionManager, StatusModel, WsConnector,
};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();
    telemetry::init();

    tracing::info!("Starting network monitor");

    let config = MonitorConfig::from_env().context("loading configuration")?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // Seed the model before any stream traffic is processed.
    let model = Arc::new(StatusModel::new());
    let mut engine = AlertEngine::new(config.alert.rule());

    let fetcher = SeedFetcher::new(config.seed_config()).context("building seed fetcher")?;
    let records = fetcher.fetch().await.context("fetching seed snapshot")?;
    engine.prime(&records);
    model
        .seed(records)
        .context("seeding the status model")?;
    tracing::info!(entities = model.len(), "Status model seeded");

    // Subscribe only to entities the snapshot actually knows.
    let (topics, unknown) = model.partition_known(&config.stream.topics);
    if !unknown.is_empty() {
        tracing::warn!(?unknown, "Dropping topics absent from the seed snapshot");
    }
    anyhow::ensure!(
        !topics.is_empty(),
        "no configured topic matches a seeded entity"
    );

    // Session manager feeds the monitor service over a bounded channel.
    let (session_tx, session_rx) = mpsc::channel::<SessionEvent>(1024);
    let (event_tx, event_rx) = mpsc::channel::<MonitorEvent>(256);

    let mut session_config = config.session_config();
    session_config.topics = topics;

    let connector = Arc::new(WsConnector::new(config.connector_config()));
    let session = Arc::new(SessionManager::new(
        session_config,
        connector,
        session_tx,
        shutdown_token.clone(),
    ));

    let service = MonitorService::new(
        MonitorServiceConfig {
            tick_interval: config.alert.tick_interval,
            max_quiet: config.alert.max_quiet,
        },
        Arc::clone(&model),
        engine,
        session_rx,
        event_tx,
        shutdown_token.clone(),
    );

    tokio::spawn(handle_monitor_events(event_rx));

    let service_handle = tokio::spawn(service.run());

    let session_clone = Arc::clone(&session);
    let session_shutdown = shutdown_token.clone();
    let session_handle = tokio::spawn(async move {
        if let Err(e) = session_clone.run().await {
            tracing::error!(error = %e, "Session ended with error");
            // Reconnects are exhausted; nothing left to monitor.
            session_shutdown.cancel();
        }
    });

    tracing::info!("Network monitor ready");

    await_shutdown(shutdown_token).await;

    let _ = session_handle.await;
    let _ = service_handle.await;

    tracing::info!("Network monitor stopped");
    Ok(())
}

/// Consume monitor events and surface them in the log.
async fn handle_monitor_events(mut rx: mpsc::Receiver<MonitorEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            MonitorEvent::Session(state) => {
                tracing::info!(?state, "Session state changed");
            }
            MonitorEvent::AlertRaised { entity, since } => {
                tracing::error!(entity = %entity, since = %since, "ALERT raised");
            }
            MonitorEvent::AlertCleared { entity } => {
                tracing::info!(entity = %entity, "Alert cleared");
            }
        }
    }
}

/// Load .env file from current or ancestor directories.
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

/// Log the parsed configuration.
fn log_config(config: &MonitorConfig) {
    tracing::info!(
        stream_url = %config.stream.url,
        seed_url = %config.seed.url,
        topics = config.stream.topics.len(),
        threshold_secs = config.alert.threshold.as_secs(),
        tick_secs = config.alert.tick_interval.as_secs(),
        tls_verify_peer = config.tls_verify_peer,
        "Configuration loaded"
    );
    if !config.tls_verify_peer {
        tracing::warn!("TLS peer verification is DISABLED");
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT) or internal cancellation.
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
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
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
        () = shutdown_token.cancelled() => {
            tracing::info!("Internal shutdown requested");
        }
    }

    shutdown_token.cancel();
}
