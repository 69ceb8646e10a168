//! Alert Evaluation Engine
//!
//! Consumes status-model transitions and applies a stateful rule of the
//! form "status has remained in the degraded set for at least the
//! threshold duration", emitting raise/clear events on state change only.
//!
//! Evaluation is time-driven: raising happens from [`AlertEngine::tick`],
//! not from message arrival, so an entity that goes silent after turning
//! degraded still alerts with zero further messages. Clearing happens
//! immediately from [`AlertEngine::observe`] when an entity leaves the
//! degraded set.
//!
//! The engine never fails and never mutates [`StatusRecord`]s; silence is
//! surfaced to it by the model as `Unknown` transitions.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::domain::status::{EntityId, Status, StatusRecord, Transition};

// =============================================================================
// Rule & State
// =============================================================================

/// Externally supplied alerting rule.
#[derive(Debug, Clone)]
pub struct AlertRule {
    /// Minimum continuous duration in the degraded set before raising.
    pub threshold: Duration,
    /// Statuses counted as degraded.
    pub degraded: HashSet<Status>,
}

impl AlertRule {
    /// Create a rule from a threshold and a degraded status set.
    #[must_use]
    pub fn new(threshold: Duration, degraded: impl IntoIterator<Item = Status>) -> Self {
        Self {
            threshold,
            degraded: degraded.into_iter().collect(),
        }
    }

    fn threshold_delta(&self) -> TimeDelta {
        TimeDelta::from_std(self.threshold).unwrap_or(TimeDelta::MAX)
    }

    fn is_degraded(&self, status: Status) -> bool {
        self.degraded.contains(&status)
    }
}

impl Default for AlertRule {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(300),
            [Status::Degraded, Status::Down, Status::Unknown],
        )
    }
}

/// Per-entity derived alert state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlertState {
    /// No alert active.
    #[default]
    Clear,
    /// Alert raised and not yet cleared.
    Raised,
}

/// Alert lifecycle events for external consumption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertEvent {
    /// An entity has been degraded for at least the threshold duration.
    Raised {
        /// Affected entity.
        entity: EntityId,
        /// Start of the degraded run the alert is attributed to.
        since: DateTime<Utc>,
    },
    /// A previously raised entity left the degraded set.
    Cleared {
        /// Affected entity.
        entity: EntityId,
    },
}

#[derive(Debug, Default)]
struct EntityAlert {
    state: AlertState,
    /// Start of the current uninterrupted degraded run, if any.
    degraded_since: Option<DateTime<Utc>>,
}

// =============================================================================
// Engine
// =============================================================================

/// Stateful rule evaluator over status transitions.
#[derive(Debug)]
pub struct AlertEngine {
    rule: AlertRule,
    entities: HashMap<EntityId, EntityAlert>,
}

impl AlertEngine {
    /// Create an engine with the given rule.
    #[must_use]
    pub fn new(rule: AlertRule) -> Self {
        Self {
            rule,
            entities: HashMap::new(),
        }
    }

    /// Initialize degraded-run tracking from seed records.
    ///
    /// An entity already degraded at seed time counts its run from the
    /// seed record's timestamp, so pre-existing degradation is not reset
    /// by startup.
    pub fn prime(&mut self, records: &[StatusRecord]) {
        for record in records {
            if self.rule.is_degraded(record.status) {
                self.entities.insert(
                    record.entity.clone(),
                    EntityAlert {
                        state: AlertState::Clear,
                        degraded_since: Some(record.last_update),
                    },
                );
            }
        }
    }

    /// Track a status transition.
    ///
    /// Returns an [`AlertEvent::Cleared`] when a raised entity leaves the
    /// degraded set. Raising is deferred to [`Self::tick`].
    pub fn observe(&mut self, transition: &Transition) -> Option<AlertEvent> {
        let entry = self.entities.entry(transition.entity.clone()).or_default();
        let now_degraded = self.rule.degraded.contains(&transition.to);

        if now_degraded {
            // Entering the set starts a run; moving between degraded
            // statuses keeps the original run start.
            if entry.degraded_since.is_none() {
                entry.degraded_since = Some(transition.at);
            }
            return None;
        }

        entry.degraded_since = None;
        if entry.state == AlertState::Raised {
            entry.state = AlertState::Clear;
            return Some(AlertEvent::Cleared {
                entity: transition.entity.clone(),
            });
        }
        None
    }

    /// Time-driven evaluation pass.
    ///
    /// Raises exactly once per degraded run once the run has lasted at
    /// least the threshold.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<AlertEvent> {
        let threshold = self.rule.threshold_delta();
        let mut events = Vec::new();

        for (entity, entry) in &mut self.entities {
            if entry.state == AlertState::Raised {
                continue;
            }
            let Some(since) = entry.degraded_since else {
                continue;
            };
            if now.signed_duration_since(since) >= threshold {
                entry.state = AlertState::Raised;
                events.push(AlertEvent::Raised {
                    entity: entity.clone(),
                    since,
                });
            }
        }

        events
    }

    /// Current alert state for an entity.
    #[must_use]
    pub fn state(&self, entity: &str) -> AlertState {
        self.entities
            .get(entity)
            .map_or(AlertState::Clear, |e| e.state)
    }

    /// The rule this engine evaluates.
    #[must_use]
    pub const fn rule(&self) -> &AlertRule {
        &self.rule
    }
}
