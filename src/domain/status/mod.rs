//! Status Model
//!
//! In-memory representation of monitored entities and their last-known
//! status. The model is the single serialization point for all status
//! mutation: decoded stream updates and time-driven silence expiry both
//! funnel through it, and consumers only ever observe fully-applied
//! transitions.
//!
//! # Ordering
//!
//! Updates carry the remote-reported timestamp, not local receipt time.
//! An update whose timestamp is not strictly newer than the stored record
//! is dropped as stale, so replaying a message stream in any order
//! converges to the same final status and timestamp. The bounded history
//! records applied updates only and therefore reflects arrival order.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

// =============================================================================
// Types
// =============================================================================

/// Unique identifier for a monitored entity (route, line, node).
pub type EntityId = String;

/// Number of recent transitions retained per entity.
const HISTORY_DEPTH: usize = 16;

/// Last-known status of a monitored entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// Operating normally.
    Normal,
    /// Degraded service (delays, partial outage).
    Degraded,
    /// Entity is down / out of service.
    Down,
    /// No reliable information available.
    Unknown,
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Normal" => Ok(Self::Normal),
            "Degraded" => Ok(Self::Degraded),
            "Down" => Ok(Self::Down),
            "Unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Normal => "Normal",
            Self::Degraded => "Degraded",
            Self::Down => "Down",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// A decoded status update from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    /// Entity the update refers to.
    pub entity: EntityId,
    /// New status reported by the remote.
    pub status: Status,
    /// Remote-reported timestamp of the change.
    pub timestamp: DateTime<Utc>,
}

/// One monitored entity's state plus bounded recent history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    /// Entity identifier.
    pub entity: EntityId,
    /// Current status.
    pub status: Status,
    /// Timestamp of the last applied update (remote-reported).
    pub last_update: DateTime<Utc>,
    /// Recent transitions, oldest first, bounded to [`HISTORY_DEPTH`].
    pub history: VecDeque<(DateTime<Utc>, Status)>,
}

impl StatusRecord {
    /// Create a record with a single initial observation.
    #[must_use]
    pub fn new(entity: EntityId, status: Status, at: DateTime<Utc>) -> Self {
        let mut history = VecDeque::with_capacity(HISTORY_DEPTH);
        history.push_back((at, status));
        Self {
            entity,
            status,
            last_update: at,
            history,
        }
    }

    fn push_history(&mut self, at: DateTime<Utc>, status: Status) {
        if self.history.len() == HISTORY_DEPTH {
            self.history.pop_front();
        }
        self.history.push_back((at, status));
    }
}

/// The result of applying an update that actually changed stored state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Entity that changed.
    pub entity: EntityId,
    /// Previous status, `None` for a first observation.
    pub from: Option<Status>,
    /// New status.
    pub to: Status,
    /// Timestamp the transition is attributed to (remote-reported).
    pub at: DateTime<Utc>,
}

/// Outcome of [`StatusModel::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The update was strictly newer and changed stored state.
    Applied(Transition),
    /// The update's timestamp was not strictly newer; state unchanged.
    Stale,
}

/// Status model errors.
#[derive(Debug, thiserror::Error)]
pub enum StatusModelError {
    /// `seed` was called after streaming updates had already been applied.
    #[error("seed must be called before the first stream update is applied")]
    SeedAfterStream,
}

// =============================================================================
// Status Model
// =============================================================================

/// Keyed store of [`StatusRecord`]s with strictly-ordered per-entity updates.
///
/// Interior locking makes the model shareable across the receive loop and
/// the evaluation tick; readers see either the prior record or the fully
/// updated one, never an intermediate state.
#[derive(Debug, Default)]
pub struct StatusModel {
    inner: RwLock<ModelInner>,
}

#[derive(Debug, Default)]
struct ModelInner {
    records: HashMap<EntityId, StatusRecord>,
    streamed: bool,
}

impl StatusModel {
    /// Create an empty model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-initialize the model from seed records.
    ///
    /// # Errors
    ///
    /// Returns [`StatusModelError::SeedAfterStream`] if any stream update has
    /// already been applied.
    pub fn seed(
        &self,
        records: impl IntoIterator<Item = StatusRecord>,
    ) -> Result<(), StatusModelError> {
        let mut inner = self.inner.write();
        if inner.streamed {
            return Err(StatusModelError::SeedAfterStream);
        }
        for record in records {
            inner.records.insert(record.entity.clone(), record);
        }
        Ok(())
    }

    /// Apply a decoded stream update.
    ///
    /// Returns [`ApplyOutcome::Stale`] when the update's timestamp is not
    /// strictly newer than the stored record's last update. Applying the
    /// same update twice therefore changes state at most once.
    pub fn apply(&self, update: &StatusUpdate) -> ApplyOutcome {
        let mut inner = self.inner.write();
        inner.streamed = true;

        match inner.records.get_mut(&update.entity) {
            Some(record) => {
                if update.timestamp <= record.last_update {
                    return ApplyOutcome::Stale;
                }
                let from = record.status;
                record.status = update.status;
                record.last_update = update.timestamp;
                record.push_history(update.timestamp, update.status);
                ApplyOutcome::Applied(Transition {
                    entity: update.entity.clone(),
                    from: Some(from),
                    to: update.status,
                    at: update.timestamp,
                })
            }
            None => {
                let record =
                    StatusRecord::new(update.entity.clone(), update.status, update.timestamp);
                inner.records.insert(update.entity.clone(), record);
                ApplyOutcome::Applied(Transition {
                    entity: update.entity.clone(),
                    from: None,
                    to: update.status,
                    at: update.timestamp,
                })
            }
        }
    }

    /// Degrade entities that have received no update for `max_quiet` to
    /// [`Status::Unknown`].
    ///
    /// The synthetic transition keeps the record's old timestamp, so the
    /// time already spent silent counts toward downstream alert thresholds.
    /// A later genuine update with a newer timestamp still applies normally.
    pub fn expire_silent(&self, now: DateTime<Utc>, max_quiet: TimeDelta) -> Vec<Transition> {
        let mut inner = self.inner.write();
        let mut transitions = Vec::new();

        for record in inner.records.values_mut() {
            if record.status == Status::Unknown {
                continue;
            }
            if now.signed_duration_since(record.last_update) < max_quiet {
                continue;
            }
            let from = record.status;
            record.status = Status::Unknown;
            record.push_history(record.last_update, Status::Unknown);
            transitions.push(Transition {
                entity: record.entity.clone(),
                from: Some(from),
                to: Status::Unknown,
                at: record.last_update,
            });
        }

        transitions
    }

    /// Pure read of one entity's record.
    #[must_use]
    pub fn snapshot(&self, entity: &str) -> Option<StatusRecord> {
        self.inner.read().records.get(entity).cloned()
    }

    /// Snapshot of all records.
    #[must_use]
    pub fn snapshot_all(&self) -> Vec<StatusRecord> {
        self.inner.read().records.values().cloned().collect()
    }

    /// Identifiers of all known entities.
    #[must_use]
    pub fn entities(&self) -> Vec<EntityId> {
        self.inner.read().records.keys().cloned().collect()
    }

    /// Split a topic list into entities the model knows and ones it does
    /// not. A subscription must only cover known entities, so callers
    /// filter (or reject) through this before subscribing.
    #[must_use]
    pub fn partition_known(&self, topics: &[EntityId]) -> (Vec<EntityId>, Vec<EntityId>) {
        let inner = self.inner.read();
        let (known, unknown) = topics
            .iter()
            .cloned()
            .partition(|topic| inner.records.contains_key(topic));
        (known, unknown)
    }

    /// Number of known entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    /// Whether the model holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }
}
