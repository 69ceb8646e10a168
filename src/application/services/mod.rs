//! Application Services
//!
//! `MonitorService` is the orchestration core: it drains session events
//! into the status model, feeds resulting transitions to the alert
//! engine, and drives the time-based evaluation tick. All alerting
//! decisions funnel through this single task, so model and engine never
//! race each other.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::alert::{AlertEngine, AlertEvent};
use crate::domain::status::{ApplyOutcome, EntityId, StatusModel};
use crate::infrastructure::stream::{SessionEvent, SessionState};

/// Events emitted by the monitor for external consumption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// The stream session changed state.
    Session(SessionState),
    /// An entity has been degraded past the alert threshold.
    AlertRaised {
        /// Affected entity.
        entity: EntityId,
        /// Start of the degraded run.
        since: DateTime<Utc>,
    },
    /// A previously alerting entity recovered.
    AlertCleared {
        /// Affected entity.
        entity: EntityId,
    },
}

/// Monitor service tuning.
#[derive(Debug, Clone)]
pub struct MonitorServiceConfig {
    /// Evaluation tick period.
    pub tick_interval: Duration,
    /// Inbound silence after which an entity is marked unknown.
    pub max_quiet: Duration,
}

impl Default for MonitorServiceConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(5),
            max_quiet: Duration::from_secs(120),
        }
    }
}

/// Single-task orchestrator between session, model, and alert engine.
pub struct MonitorService {
    config: MonitorServiceConfig,
    model: Arc<StatusModel>,
    engine: AlertEngine,
    session_rx: mpsc::Receiver<SessionEvent>,
    event_tx: mpsc::Sender<MonitorEvent>,
    cancel: CancellationToken,
}

impl MonitorService {
    /// Create the service. The engine should already be primed with any
    /// seed records applied to the model.
    #[must_use]
    pub fn new(
        config: MonitorServiceConfig,
        model: Arc<StatusModel>,
        engine: AlertEngine,
        session_rx: mpsc::Receiver<SessionEvent>,
        event_tx: mpsc::Sender<MonitorEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            model,
            engine,
            session_rx,
            event_tx,
            cancel,
        }
    }

    /// Run until cancelled or the session event channel closes.
    pub async fn run(mut self) {
        let mut tick = tokio::time::interval(self.config.tick_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let max_quiet =
            TimeDelta::from_std(self.config.max_quiet).unwrap_or(TimeDelta::MAX);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                event = self.session_rx.recv() => match event {
                    Some(event) => self.on_session_event(event).await,
                    None => break,
                },
                _ = tick.tick() => self.on_tick(Utc::now(), max_quiet).await,
            }
        }
        tracing::info!("Monitor service stopped");
    }

    async fn on_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Update(update) => {
                match self.model.apply(&update) {
                    ApplyOutcome::Applied(transition) => {
                        tracing::debug!(
                            entity = %transition.entity,
                            to = %transition.to,
                            "Status transition"
                        );
                        if let Some(alert) = self.engine.observe(&transition) {
                            self.forward(alert).await;
                        }
                    }
                    ApplyOutcome::Stale => {
                        tracing::trace!(entity = %update.entity, "Dropped stale update");
                    }
                }
            }
            SessionEvent::Subscribed(entities) => {
                tracing::info!(count = entities.len(), "Subscription active");
            }
            SessionEvent::StateChanged(state) => {
                let _ = self.event_tx.send(MonitorEvent::Session(state)).await;
            }
        }
    }

    async fn on_tick(&mut self, now: DateTime<Utc>, max_quiet: TimeDelta) {
        // Silence first: an entity that went quiet flips to Unknown with a
        // backdated transition, then the same tick can evaluate it.
        for transition in self.model.expire_silent(now, max_quiet) {
            tracing::warn!(entity = %transition.entity, "Entity went silent");
            if let Some(alert) = self.engine.observe(&transition) {
                self.forward(alert).await;
            }
        }
        for alert in self.engine.tick(now) {
            self.forward(alert).await;
        }
    }

    async fn forward(&self, alert: AlertEvent) {
        let event = match alert {
            AlertEvent::Raised { entity, since } => MonitorEvent::AlertRaised { entity, since },
            AlertEvent::Cleared { entity } => MonitorEvent::AlertCleared { entity },
        };
        let _ = self.event_tx.send(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::alert::AlertRule;
    use crate::domain::status::{Status, StatusRecord, StatusUpdate};

    fn service(
        rule: AlertRule,
        seed: Vec<StatusRecord>,
        max_quiet: Duration,
    ) -> (
        mpsc::Sender<SessionEvent>,
        mpsc::Receiver<MonitorEvent>,
        CancellationToken,
        tokio::task::JoinHandle<()>,
    ) {
        let model = Arc::new(StatusModel::new());
        model.seed(seed.clone()).unwrap();
        let mut engine = AlertEngine::new(rule);
        engine.prime(&seed);

        let (session_tx, session_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let svc = MonitorService::new(
            MonitorServiceConfig {
                tick_interval: Duration::from_millis(10),
                max_quiet,
            },
            model,
            engine,
            session_rx,
            event_tx,
            cancel.clone(),
        );
        let handle = tokio::spawn(svc.run());
        (session_tx, event_rx, cancel, handle)
    }

    async fn next_alert(rx: &mut mpsc::Receiver<MonitorEvent>) -> MonitorEvent {
        loop {
            match rx.recv().await {
                Some(MonitorEvent::Session(_)) => {}
                Some(event) => return event,
                None => panic!("event channel closed"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn degraded_update_raises_on_tick() {
        // Zero threshold: the first tick after the transition raises.
        let rule = AlertRule::new(Duration::ZERO, [Status::Degraded]);
        let (session_tx, mut event_rx, cancel, handle) =
            service(rule, vec![], Duration::from_secs(3600));

        let at = Utc::now();
        session_tx
            .send(SessionEvent::Update(StatusUpdate {
                entity: "district".to_string(),
                status: Status::Degraded,
                timestamp: at,
            }))
            .await
            .unwrap();

        let event = next_alert(&mut event_rx).await;
        assert_eq!(
            event,
            MonitorEvent::AlertRaised {
                entity: "district".to_string(),
                since: at,
            }
        );

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn recovery_clears_immediately() {
        let rule = AlertRule::new(Duration::ZERO, [Status::Degraded]);
        let (session_tx, mut event_rx, cancel, handle) =
            service(rule, vec![], Duration::from_secs(3600));

        let at = Utc::now();
        session_tx
            .send(SessionEvent::Update(StatusUpdate {
                entity: "district".to_string(),
                status: Status::Degraded,
                timestamp: at,
            }))
            .await
            .unwrap();
        assert!(matches!(
            next_alert(&mut event_rx).await,
            MonitorEvent::AlertRaised { .. }
        ));

        session_tx
            .send(SessionEvent::Update(StatusUpdate {
                entity: "district".to_string(),
                status: Status::Normal,
                timestamp: at + TimeDelta::seconds(1),
            }))
            .await
            .unwrap();
        assert_eq!(
            next_alert(&mut event_rx).await,
            MonitorEvent::AlertCleared {
                entity: "district".to_string(),
            }
        );

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn silent_seeded_entity_expires_and_raises() {
        // Seeded long ago, never updated: silence flips it to Unknown and
        // the backdated run start exceeds the threshold at once.
        let rule = AlertRule::new(Duration::from_secs(60), [Status::Unknown]);
        let seed = vec![StatusRecord::new(
            "victoria".to_string(),
            Status::Normal,
            Utc::now() - TimeDelta::seconds(300),
        )];
        let (_session_tx, mut event_rx, cancel, handle) =
            service(rule, seed, Duration::from_secs(120));

        let event = next_alert(&mut event_rx).await;
        assert!(matches!(
            event,
            MonitorEvent::AlertRaised { entity, .. } if entity == "victoria"
        ));

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn session_states_are_forwarded() {
        let rule = AlertRule::default();
        let (session_tx, mut event_rx, cancel, handle) =
            service(rule, vec![], Duration::from_secs(3600));

        session_tx
            .send(SessionEvent::StateChanged(SessionState::Active))
            .await
            .unwrap();
        assert_eq!(
            event_rx.recv().await,
            Some(MonitorEvent::Session(SessionState::Active))
        );

        cancel.cancel();
        handle.await.unwrap();
    }
}
