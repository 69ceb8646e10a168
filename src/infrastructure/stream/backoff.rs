//! Reconnect Backoff
//!
//! Exponential backoff with a capped maximum delay and a jitter term,
//! used by the session manager between reconnection attempts.

use std::time::Duration;

use rand::Rng;

/// Backoff tuning.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first retry.
    pub initial: Duration,
    /// Upper bound on any single delay.
    pub max: Duration,
    /// Growth factor applied per attempt.
    pub multiplier: f64,
    /// Jitter as a fraction of the delay (0.1 = ±10%).
    pub jitter: f64,
    /// Attempt limit; 0 means unlimited.
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.1,
            max_attempts: 0,
        }
    }
}

/// Backoff state for one run of consecutive failures.
///
/// `next_delay` yields a non-decreasing (modulo jitter) sequence of delays
/// until the attempt limit is hit; `reset` rewinds after a successful
/// connection so the next failure starts from the initial delay again.
#[derive(Debug)]
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    /// Create a fresh backoff from its configuration.
    #[must_use]
    pub const fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Delay to wait before the next attempt, or `None` once the attempt
    /// limit is exhausted.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.config.max_attempts > 0 && self.attempt >= self.config.max_attempts {
            return None;
        }
        let exponent = self.attempt;
        self.attempt += 1;
        Some(self.jittered(self.base_delay(exponent)))
    }

    /// Number of attempts handed out since the last reset.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Rewind after a successful connection.
    pub const fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Undithered delay for a given attempt index, capped at the maximum.
    fn base_delay(&self, exponent: u32) -> Duration {
        #[allow(clippy::cast_precision_loss)]
        let scaled = self.config.initial.as_secs_f64() * self.config.multiplier.powi(
            i32::try_from(exponent).unwrap_or(i32::MAX),
        );
        let capped = scaled.min(self.config.max.as_secs_f64());
        if capped.is_finite() && capped > 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.config.max
        }
    }

    fn jittered(&self, base: Duration) -> Duration {
        if self.config.jitter <= 0.0 {
            return base;
        }
        let secs = base.as_secs_f64();
        let spread = secs * self.config.jitter;
        let offset: f64 = rand::rng().random_range(-spread..=spread);
        Duration::from_secs_f64((secs + offset).max(0.001))
    }
}
