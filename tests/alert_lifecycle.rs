//! End-to-end alerting scenarios across the status model and alert engine,
//! exercising the same seed/apply/expire/tick sequence the monitor service
//! drives at runtime.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use network_monitor::{
    AlertEngine, AlertEvent, AlertRule, AlertState, Status, StatusModel, StatusRecord,
    StatusUpdate,
};

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap()
}

fn update(entity: &str, status: Status, secs: i64) -> StatusUpdate {
    StatusUpdate {
        entity: entity.to_string(),
        status,
        timestamp: ts(secs),
    }
}

/// One evaluation pass the way the monitor service runs it: expire quiet
/// entities, feed the transitions through, then tick.
fn evaluate(
    model: &StatusModel,
    engine: &mut AlertEngine,
    now: DateTime<Utc>,
    max_quiet: TimeDelta,
) -> Vec<AlertEvent> {
    let mut events = Vec::new();
    for transition in model.expire_silent(now, max_quiet) {
        if let Some(event) = engine.observe(&transition) {
            events.push(event);
        }
    }
    events.extend(engine.tick(now));
    events
}

#[test]
fn seeded_degradation_raises_without_any_traffic() {
    // Seed: A is Normal, B is already Degraded. Threshold 60s, only
    // Degraded counts. Then total silence for 61s.
    let model = StatusModel::new();
    let seed = vec![
        StatusRecord::new("A".to_string(), Status::Normal, ts(0)),
        StatusRecord::new("B".to_string(), Status::Degraded, ts(0)),
    ];
    let mut engine = AlertEngine::new(AlertRule::new(
        Duration::from_secs(60),
        [Status::Degraded],
    ));
    engine.prime(&seed);
    model.seed(seed).unwrap();

    let events = evaluate(&model, &mut engine, ts(61), TimeDelta::seconds(120));
    assert_eq!(
        events,
        vec![AlertEvent::Raised {
            entity: "B".to_string(),
            since: ts(0),
        }]
    );

    // A went quiet too, but Unknown is not in the degraded set here.
    let events = evaluate(&model, &mut engine, ts(130), TimeDelta::seconds(120));
    assert!(events.is_empty());
    assert_eq!(engine.state("A"), AlertState::Clear);
    assert_eq!(model.snapshot("A").unwrap().status, Status::Unknown);
}

#[test]
fn silence_counts_toward_threshold_when_unknown_is_degraded() {
    // Default-style rule where Unknown counts. Entity last heard from at
    // t=0; at t=130 it expires with a run start backdated to t=0, which
    // already exceeds the 60s threshold.
    let model = StatusModel::new();
    let seed = vec![StatusRecord::new("A".to_string(), Status::Normal, ts(0))];
    let mut engine = AlertEngine::new(AlertRule::new(
        Duration::from_secs(60),
        [Status::Degraded, Status::Down, Status::Unknown],
    ));
    engine.prime(&seed);
    model.seed(seed).unwrap();

    let events = evaluate(&model, &mut engine, ts(130), TimeDelta::seconds(120));
    assert_eq!(
        events,
        vec![AlertEvent::Raised {
            entity: "A".to_string(),
            since: ts(0),
        }]
    );
}

#[test]
fn stale_recovery_does_not_clear() {
    // Degraded at t=10 raises; an out-of-order Normal stamped t=5 must
    // not clear it because the model drops it as stale.
    let model = StatusModel::new();
    let mut engine = AlertEngine::new(AlertRule::new(
        Duration::from_secs(60),
        [Status::Degraded],
    ));

    if let network_monitor::ApplyOutcome::Applied(t) =
        model.apply(&update("A", Status::Degraded, 10))
    {
        engine.observe(&t);
    }
    assert_eq!(evaluate(&model, &mut engine, ts(70), TimeDelta::seconds(300)).len(), 1);

    assert_eq!(
        model.apply(&update("A", Status::Normal, 5)),
        network_monitor::ApplyOutcome::Stale
    );
    assert_eq!(engine.state("A"), AlertState::Raised);
    assert_eq!(model.snapshot("A").unwrap().status, Status::Degraded);
}

#[test]
fn recovery_after_silence_clears_the_alert() {
    let model = StatusModel::new();
    let seed = vec![StatusRecord::new("A".to_string(), Status::Down, ts(0))];
    let mut engine = AlertEngine::new(AlertRule::new(
        Duration::from_secs(60),
        [Status::Down, Status::Unknown],
    ));
    engine.prime(&seed);
    model.seed(seed).unwrap();

    assert_eq!(evaluate(&model, &mut engine, ts(61), TimeDelta::seconds(300)).len(), 1);

    // A genuine newer update arrives after the alert.
    if let network_monitor::ApplyOutcome::Applied(t) =
        model.apply(&update("A", Status::Normal, 100))
    {
        assert_eq!(
            engine.observe(&t),
            Some(AlertEvent::Cleared {
                entity: "A".to_string(),
            })
        );
    } else {
        panic!("update should apply");
    }
    assert!(evaluate(&model, &mut engine, ts(200), TimeDelta::seconds(300)).is_empty());
}

#[test]
fn flapping_entity_never_raises() {
    // Alternates Degraded/Normal every 30s against a 60s threshold.
    let model = StatusModel::new();
    let mut engine = AlertEngine::new(AlertRule::new(
        Duration::from_secs(60),
        [Status::Degraded],
    ));

    for i in 0..10 {
        let status = if i % 2 == 0 {
            Status::Degraded
        } else {
            Status::Normal
        };
        if let network_monitor::ApplyOutcome::Applied(t) =
            model.apply(&update("A", status, i * 30))
        {
            assert!(engine.observe(&t).is_none());
        }
        assert!(engine.tick(ts(i * 30 + 1)).is_empty());
    }
    assert_eq!(engine.state("A"), AlertState::Clear);
}
