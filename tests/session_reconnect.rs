//! Session manager behavior against a scripted in-memory transport:
//! reconnect pacing, handshake-to-active flow, and prompt shutdown.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use network_monitor::{
    BackoffConfig, Frame, KeepaliveConfig, SessionConfig, SessionError, SessionEvent,
    SessionManager, SessionState, StreamTransport, TransportConnector, TransportError,
};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

struct ScriptedTransport {
    inbound: VecDeque<Frame>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl StreamTransport for ScriptedTransport {
    async fn send(&mut self, _frame: Frame) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<Frame>, TransportError> {
        match self.inbound.pop_front() {
            Some(frame) => Ok(Some(frame)),
            // Script exhausted: stay connected but silent.
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Always refuses connections, recording when each attempt happened.
struct RefusingConnector {
    attempts: parking_lot::Mutex<Vec<Instant>>,
}

#[async_trait]
impl TransportConnector for RefusingConnector {
    async fn connect(&self) -> Result<Box<dyn StreamTransport>, TransportError> {
        self.attempts.lock().push(Instant::now());
        Err(TransportError::Connect("connection refused".to_string()))
    }
}

/// Hands out one scripted transport, then refuses.
struct OneShotConnector {
    script: parking_lot::Mutex<Option<VecDeque<Frame>>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl TransportConnector for OneShotConnector {
    async fn connect(&self) -> Result<Box<dyn StreamTransport>, TransportError> {
        match self.script.lock().take() {
            Some(inbound) => Ok(Box::new(ScriptedTransport {
                inbound,
                closed: Arc::clone(&self.closed),
            })),
            None => Err(TransportError::Connect("connection refused".to_string())),
        }
    }
}

fn config(max_attempts: u32) -> SessionConfig {
    SessionConfig {
        username: "monitor".to_string(),
        password: "secret".to_string(),
        topics: vec!["district".to_string(), "victoria".to_string()],
        backoff: BackoffConfig {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(1),
            multiplier: 2.0,
            jitter: 0.0,
            max_attempts,
        },
        keepalive: KeepaliveConfig {
            ping_interval: Duration::from_secs(20),
            // Effectively disabled for these tests.
            idle_timeout: Duration::from_secs(1_000_000),
        },
    }
}

#[tokio::test(start_paused = true)]
async fn backoff_doubles_between_attempts_up_to_the_cap() {
    let connector = Arc::new(RefusingConnector {
        attempts: parking_lot::Mutex::new(Vec::new()),
    });
    let (event_tx, _event_rx) = mpsc::channel(256);
    let manager = Arc::new(SessionManager::new(
        config(6),
        Arc::clone(&connector) as Arc<dyn TransportConnector>,
        event_tx,
        CancellationToken::new(),
    ));

    let result = Arc::clone(&manager).run().await;
    assert!(matches!(result, Err(SessionError::RetriesExhausted)));

    let attempts = connector.attempts.lock().clone();
    assert_eq!(attempts.len(), 7, "initial attempt plus six retries");

    let gaps: Vec<Duration> = attempts.windows(2).map(|w| w[1] - w[0]).collect();
    // 100ms doubling, capped at 1s.
    let expected = [100, 200, 400, 800, 1000, 1000].map(Duration::from_millis);
    assert_eq!(gaps, expected);
}

#[tokio::test(start_paused = true)]
async fn handshake_reaches_active_and_updates_flow() {
    let closed = Arc::new(AtomicBool::new(false));
    let script: VecDeque<Frame> = [
        r#"{"type":"welcome"}"#,
        r#"{"type":"auth_ok","session":"s-42"}"#,
        r#"{"type":"subscribed","entities":["district","victoria"]}"#,
        r#"{"type":"status","entity":"victoria","status":"Down","ts":"2026-03-01T09:00:00Z"}"#,
    ]
    .into_iter()
    .map(|s| Frame::Text(s.to_string()))
    .collect();
    let connector = Arc::new(OneShotConnector {
        script: parking_lot::Mutex::new(Some(script)),
        closed: Arc::clone(&closed),
    });

    let (event_tx, mut event_rx) = mpsc::channel(256);
    let cancel = CancellationToken::new();
    let manager = Arc::new(SessionManager::new(config(0), connector, event_tx, cancel));

    let handle = tokio::spawn(Arc::clone(&manager).run());

    let mut states = Vec::new();
    let update = loop {
        match event_rx.recv().await.expect("event stream ended early") {
            SessionEvent::StateChanged(state) => states.push(state),
            SessionEvent::Update(update) => break update,
            SessionEvent::Subscribed(_) => {}
        }
    };

    assert_eq!(update.entity, "victoria");
    assert!(states.contains(&SessionState::Connecting));
    assert!(states.contains(&SessionState::Authenticating));
    assert!(states.contains(&SessionState::Subscribing));
    assert_eq!(states.last(), Some(&SessionState::Active));
    assert_eq!(manager.session_id(), Some("s-42".to_string()));

    manager.stop();
    assert!(handle.await.unwrap().is_ok());
    assert_eq!(manager.state(), SessionState::ShutDown);
    assert!(closed.load(Ordering::SeqCst), "transport closed on shutdown");
}

#[tokio::test(start_paused = true)]
async fn stop_interrupts_a_long_backoff() {
    let connector = Arc::new(RefusingConnector {
        attempts: parking_lot::Mutex::new(Vec::new()),
    });
    let mut cfg = config(0);
    cfg.backoff.initial = Duration::from_secs(3600);
    cfg.backoff.max = Duration::from_secs(3600);

    let (event_tx, _event_rx) = mpsc::channel(256);
    let manager = Arc::new(SessionManager::new(
        cfg,
        connector,
        event_tx,
        CancellationToken::new(),
    ));

    let handle = tokio::spawn(Arc::clone(&manager).run());
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(matches!(
        manager.state(),
        SessionState::Reconnecting { attempt: 1 }
    ));

    let before = Instant::now();
    manager.stop();
    assert!(handle.await.unwrap().is_ok());
    // Shutdown did not wait out the hour-long backoff.
    assert!(before.elapsed() < Duration::from_secs(1));
    assert_eq!(manager.state(), SessionState::ShutDown);
}

#[tokio::test(start_paused = true)]
async fn rejected_handshake_triggers_reconnect() {
    let closed = Arc::new(AtomicBool::new(false));
    let script: VecDeque<Frame> = [
        r#"{"type":"welcome"}"#,
        r#"{"type":"error","code":401,"msg":"bad credentials"}"#,
    ]
    .into_iter()
    .map(|s| Frame::Text(s.to_string()))
    .collect();
    let connector = Arc::new(OneShotConnector {
        script: parking_lot::Mutex::new(Some(script)),
        closed: Arc::clone(&closed),
    });

    let (event_tx, mut event_rx) = mpsc::channel(256);
    let manager = Arc::new(SessionManager::new(
        config(1),
        connector,
        event_tx,
        CancellationToken::new(),
    ));

    let result = Arc::clone(&manager).run().await;
    assert!(matches!(result, Err(SessionError::RetriesExhausted)));
    assert!(closed.load(Ordering::SeqCst), "transport closed after rejection");

    let saw_reconnecting = std::iter::from_fn(|| event_rx.try_recv().ok()).any(|e| {
        matches!(
            e,
            SessionEvent::StateChanged(SessionState::Reconnecting { .. })
        )
    });
    assert!(saw_reconnecting);
}
