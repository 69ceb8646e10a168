//! Seed Fetcher
//!
//! One-shot HTTPS fetch of the current status snapshot, used to populate
//! the status model before the stream session starts delivering deltas.
//!
//! The snapshot document is a JSON object keyed by entity id. Values come
//! in two shapes, both accepted:
//!
//! ```json
//! {
//!   "district": "Normal",
//!   "victoria": { "status": "Degraded", "ts": "2026-03-01T08:00:00Z" }
//! }
//! ```
//!
//! A bare status string carries no timestamp; those records are stamped
//! with the fetch time so they never outrank a later stream update.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::status::{EntityId, Status, StatusRecord};

// =============================================================================
// Errors
// =============================================================================

/// Seed fetch failures.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request could not be sent or the response not read.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("unexpected response status: {0}")]
    Status(reqwest::StatusCode),

    /// The response body is not a valid snapshot document.
    #[error("malformed snapshot document: {0}")]
    Malformed(String),

    /// All configured attempts failed.
    #[error("seed fetch failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The final attempt's error.
        last: String,
    },
}

// =============================================================================
// Configuration
// =============================================================================

/// Seed fetcher configuration.
#[derive(Debug, Clone)]
pub struct SeedConfig {
    /// Full `https://` snapshot URL.
    pub url: String,
    /// Verify the server certificate against the system trust roots.
    pub verify_peer: bool,
    /// Total attempts before giving up.
    pub attempts: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            verify_peer: true,
            attempts: 3,
            retry_delay: Duration::from_secs(2),
            request_timeout: Duration::from_secs(10),
        }
    }
}

// =============================================================================
// Wire format
// =============================================================================

/// One entity's entry in the snapshot document.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SeedEntry {
    /// `"entity": "Normal"`
    Bare(Status),
    /// `"entity": {"status": "Normal", "ts": "..."}`
    Timestamped {
        status: Status,
        ts: DateTime<Utc>,
    },
}

// =============================================================================
// Fetcher
// =============================================================================

/// Fetches and parses the status snapshot, with bounded fixed-delay retries.
#[derive(Debug)]
pub struct SeedFetcher {
    config: SeedConfig,
    client: reqwest::Client,
}

impl SeedFetcher {
    /// Build a fetcher for the configured snapshot endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the underlying client cannot be
    /// constructed.
    pub fn new(config: SeedConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(!config.verify_peer)
            .build()?;
        Ok(Self { config, client })
    }

    /// Fetch the snapshot and return it as seed records.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::RetriesExhausted`] once every attempt has
    /// failed; individual attempt failures are logged and retried.
    pub async fn fetch(&self) -> Result<Vec<StatusRecord>, FetchError> {
        let attempts = self.config.attempts.max(1);
        let mut last = String::new();

        for attempt in 1..=attempts {
            match self.fetch_once().await {
                Ok(records) => {
                    tracing::info!(entities = records.len(), attempt, "Seed snapshot loaded");
                    return Ok(records);
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempt, "Seed fetch attempt failed");
                    last = e.to_string();
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        Err(FetchError::RetriesExhausted { attempts, last })
    }

    async fn fetch_once(&self) -> Result<Vec<StatusRecord>, FetchError> {
        let response = self.client.get(&self.config.url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }
        let body = response.text().await?;
        parse_snapshot(&body, Utc::now())
    }
}

/// Parse a snapshot document into seed records.
///
/// `fetched_at` stamps entries that carry no timestamp of their own.
///
/// # Errors
///
/// Returns [`FetchError::Malformed`] if the body is not a JSON object of
/// recognizable entries.
pub fn parse_snapshot(
    body: &str,
    fetched_at: DateTime<Utc>,
) -> Result<Vec<StatusRecord>, FetchError> {
    let entries: HashMap<EntityId, SeedEntry> =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))?;

    Ok(entries
        .into_iter()
        .map(|(entity, entry)| match entry {
            SeedEntry::Bare(status) => StatusRecord::new(entity, status, fetched_at),
            SeedEntry::Timestamped { status, ts } => StatusRecord::new(entity, status, ts),
        })
        .collect())
}
