//! Monitor Configuration
//!
//! Configuration types for the network monitor, loaded from environment
//! variables. Endpoints and credentials are required; everything else has
//! a sensible default and is only overridden for tuning.

use std::collections::HashSet;
use std::time::Duration;

use crate::domain::alert::AlertRule;
use crate::domain::status::{EntityId, Status};
use crate::infrastructure::seed::SeedConfig;
use crate::infrastructure::stream::{BackoffConfig, KeepaliveConfig, SessionConfig};
use crate::infrastructure::stream::transport::WsConnectorConfig;

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable has an unparseable value.
    #[error("environment variable {key} has invalid value: {detail}")]
    Invalid {
        /// Variable name.
        key: String,
        /// Why the value was rejected.
        detail: String,
    },
}

/// Account credentials for the stream handshake.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Create new credentials.
    #[must_use]
    pub const fn new(username: String, password: String) -> Self {
        Self { username, password }
    }

    /// Get the account name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Get the account secret.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Alert evaluation settings.
#[derive(Debug, Clone)]
pub struct AlertSettings {
    /// How long an entity must stay degraded before an alert raises.
    pub threshold: Duration,
    /// Statuses that count as degraded.
    pub degraded: HashSet<Status>,
    /// Evaluation tick period.
    pub tick_interval: Duration,
    /// Inbound silence after which an entity is marked [`Status::Unknown`].
    pub max_quiet: Duration,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            threshold: Duration::from_secs(300),
            degraded: HashSet::from([Status::Degraded, Status::Down, Status::Unknown]),
            tick_interval: Duration::from_secs(5),
            max_quiet: Duration::from_secs(120),
        }
    }
}

impl AlertSettings {
    /// Build the alert rule these settings describe.
    #[must_use]
    pub fn rule(&self) -> AlertRule {
        AlertRule {
            threshold: self.threshold,
            degraded: self.degraded.clone(),
        }
    }
}

/// Stream connection settings.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Full `wss://` feed endpoint URL.
    pub url: String,
    /// Entities to subscribe to.
    pub topics: Vec<EntityId>,
    /// Reconnect backoff tuning.
    pub backoff: BackoffConfig,
    /// Keep-alive tuning.
    pub keepalive: KeepaliveConfig,
}

/// Seed snapshot settings.
#[derive(Debug, Clone)]
pub struct SeedSettings {
    /// Full `https://` snapshot URL.
    pub url: String,
    /// Total fetch attempts before giving up.
    pub attempts: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
}

impl Default for SeedSettings {
    fn default() -> Self {
        let defaults = SeedConfig::default();
        Self {
            url: String::new(),
            attempts: defaults.attempts,
            retry_delay: defaults.retry_delay,
        }
    }
}

/// Complete monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Stream credentials.
    pub credentials: Credentials,
    /// Stream connection settings.
    pub stream: StreamSettings,
    /// Seed snapshot settings.
    pub seed: SeedSettings,
    /// Alert evaluation settings.
    pub alert: AlertSettings,
    /// Verify server certificates against the system trust roots.
    pub tls_verify_peer: bool,
}

impl MonitorConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a required environment variable is missing or
    /// empty, or a value cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let stream_url = require_env("NM_STREAM_URL")?;
        let seed_url = require_env("NM_SEED_URL")?;
        let username = require_env("NM_USERNAME")?;
        let password = require_env("NM_PASSWORD")?;

        let topics: Vec<EntityId> = require_env("NM_TOPICS")?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if topics.is_empty() {
            return Err(ConfigError::EmptyValue("NM_TOPICS".to_string()));
        }

        let alert_defaults = AlertSettings::default();
        let degraded = match std::env::var("NM_DEGRADED_STATUSES") {
            Ok(raw) => parse_status_set("NM_DEGRADED_STATUSES", &raw)?,
            Err(_) => alert_defaults.degraded.clone(),
        };

        let alert = AlertSettings {
            threshold: parse_env_duration_secs("NM_ALERT_THRESHOLD_SECS", alert_defaults.threshold),
            degraded,
            tick_interval: parse_env_duration_secs(
                "NM_TICK_INTERVAL_SECS",
                alert_defaults.tick_interval,
            ),
            max_quiet: parse_env_duration_secs("NM_MAX_QUIET_SECS", alert_defaults.max_quiet),
        };

        let backoff_defaults = BackoffConfig::default();
        let backoff = BackoffConfig {
            initial: parse_env_duration_millis(
                "NM_RECONNECT_DELAY_INITIAL_MS",
                backoff_defaults.initial,
            ),
            max: parse_env_duration_secs("NM_RECONNECT_DELAY_MAX_SECS", backoff_defaults.max),
            multiplier: parse_env_f64(
                "NM_RECONNECT_DELAY_MULTIPLIER",
                backoff_defaults.multiplier,
            ),
            jitter: parse_env_f64("NM_RECONNECT_JITTER", backoff_defaults.jitter),
            max_attempts: parse_env_u32(
                "NM_MAX_RECONNECT_ATTEMPTS",
                backoff_defaults.max_attempts,
            ),
        };

        let keepalive_defaults = KeepaliveConfig::default();
        let keepalive = KeepaliveConfig {
            ping_interval: parse_env_duration_secs(
                "NM_PING_INTERVAL_SECS",
                keepalive_defaults.ping_interval,
            ),
            idle_timeout: parse_env_duration_secs(
                "NM_IDLE_TIMEOUT_SECS",
                keepalive_defaults.idle_timeout,
            ),
        };

        let seed_defaults = SeedSettings::default();
        let seed = SeedSettings {
            url: seed_url,
            attempts: parse_env_u32("NM_SEED_ATTEMPTS", seed_defaults.attempts),
            retry_delay: parse_env_duration_secs(
                "NM_SEED_RETRY_DELAY_SECS",
                seed_defaults.retry_delay,
            ),
        };

        let tls_verify_peer = parse_env_bool("NM_TLS_VERIFY_PEER", true);

        Ok(Self {
            credentials: Credentials::new(username, password),
            stream: StreamSettings {
                url: stream_url,
                topics,
                backoff,
                keepalive,
            },
            seed,
            alert,
            tls_verify_peer,
        })
    }

    /// Session configuration derived from this config.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            username: self.credentials.username().to_string(),
            password: self.credentials.password().to_string(),
            topics: self.stream.topics.clone(),
            backoff: self.stream.backoff.clone(),
            keepalive: self.stream.keepalive.clone(),
        }
    }

    /// Connector configuration derived from this config.
    #[must_use]
    pub fn connector_config(&self) -> WsConnectorConfig {
        WsConnectorConfig {
            url: self.stream.url.clone(),
            verify_peer: self.tls_verify_peer,
        }
    }

    /// Seed fetcher configuration derived from this config.
    #[must_use]
    pub fn seed_config(&self) -> SeedConfig {
        SeedConfig {
            url: self.seed.url.clone(),
            verify_peer: self.tls_verify_peer,
            attempts: self.seed.attempts,
            retry_delay: self.seed.retry_delay,
            ..SeedConfig::default()
        }
    }
}

fn require_env(key: &str) -> Result<String, ConfigError> {
    let value =
        std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))?;
    if value.is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(value)
}

fn parse_status_set(key: &str, raw: &str) -> Result<HashSet<Status>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Status>().map_err(|detail| ConfigError::Invalid {
                key: key.to_string(),
                detail,
            })
        })
        .collect()
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map_or(default, |v| {
            matches!(v.to_lowercase().as_str(), "1" | "true" | "yes")
        })
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
