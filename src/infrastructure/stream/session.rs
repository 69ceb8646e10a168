//! Session Manager
//!
//! Maintains a logical subscribed session on top of the transport. The
//! session outlives individual connections: on any connection loss it
//! waits out an exponential backoff and re-runs the full
//! authenticate+subscribe handshake from scratch.
//!
//! State machine:
//!
//! ```text
//! Disconnected → Connecting → Authenticating → Subscribing → Active
//!       ▲                                                      │
//!       └────────────── Reconnecting ◄── (connection lost) ◄───┘
//! ```
//!
//! `ShutDown` is terminal and reachable only through [`SessionManager::stop`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::backoff::{Backoff, BackoffConfig};
use super::codec::FeedCodec;
use super::handshake::{Handshake, HandshakeError, HandshakeStep};
use super::messages::FeedMessage;
use crate::application::ports::{Frame, StreamTransport, TransportConnector, TransportError};
use crate::domain::status::{EntityId, StatusUpdate};

// =============================================================================
// Errors
// =============================================================================

/// Errors surfaced by the session manager.
///
/// Everything except `RetriesExhausted` is recovered internally through
/// the reconnect machine and only observable as state-change events.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The handshake was rejected or violated.
    #[error("handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// The peer closed the connection.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// The configured reconnect attempt limit was reached.
    #[error("maximum reconnection attempts exceeded")]
    RetriesExhausted,
}

// =============================================================================
// States & events
// =============================================================================

/// Observable session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No connection and no attempt in progress.
    #[default]
    Disconnected,
    /// Opening the transport.
    Connecting,
    /// Transport up; authenticating.
    Authenticating,
    /// Authenticated; subscribing.
    Subscribing,
    /// Fully established; status updates are flowing.
    Active,
    /// Waiting out backoff before the next attempt.
    Reconnecting {
        /// Attempt number within the current failure run.
        attempt: u32,
    },
    /// Terminal; reached only via [`SessionManager::stop`].
    ShutDown,
}

/// Events emitted by the session manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session state changed.
    StateChanged(SessionState),
    /// Subscription confirmed for the listed entities.
    Subscribed(Vec<EntityId>),
    /// A status update arrived.
    Update(StatusUpdate),
}

// =============================================================================
// Configuration
// =============================================================================

/// Keep-alive tuning.
#[derive(Debug, Clone)]
pub struct KeepaliveConfig {
    /// Interval between outbound pings (also the receive poll budget).
    pub ping_interval: Duration,
    /// Inbound silence after which the connection is considered dead.
    pub idle_timeout: Duration,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(20),
            idle_timeout: Duration::from_secs(60),
        }
    }
}

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Account name for the auth handshake.
    pub username: String,
    /// Account secret for the auth handshake.
    pub password: String,
    /// Entities to subscribe to.
    pub topics: Vec<EntityId>,
    /// Reconnect backoff tuning.
    pub backoff: BackoffConfig,
    /// Keep-alive tuning.
    pub keepalive: KeepaliveConfig,
}

// =============================================================================
// Session manager
// =============================================================================

/// How one connection's receive loop ended.
enum LoopEnd {
    Cancelled,
    Failed(SessionError),
}

/// Owns the session lifecycle: connect, handshake, receive, reconnect.
///
/// Constructed explicitly and handed to collaborators; multiple managers
/// can coexist in one process.
pub struct SessionManager {
    config: SessionConfig,
    connector: Arc<dyn TransportConnector>,
    codec: FeedCodec,
    event_tx: mpsc::Sender<SessionEvent>,
    cancel: CancellationToken,
    state: RwLock<SessionState>,
    session_id: RwLock<Option<String>>,
}

impl SessionManager {
    /// Create a session manager.
    #[must_use]
    pub fn new(
        config: SessionConfig,
        connector: Arc<dyn TransportConnector>,
        event_tx: mpsc::Sender<SessionEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            connector,
            codec: FeedCodec::new(),
            event_tx,
            cancel,
            state: RwLock::new(SessionState::Disconnected),
            session_id: RwLock::new(None),
        }
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Remote-issued id of the most recent established session.
    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    /// Request shutdown. Idempotent and safe from any task; in-progress
    /// backoff waits abort promptly and the transport is closed before
    /// the run task completes.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Run the session until stopped or the attempt limit is exhausted.
    pub async fn run(self: Arc<Self>) -> Result<(), SessionError> {
        let mut backoff = Backoff::new(self.config.backoff.clone());

        loop {
            if self.cancel.is_cancelled() {
                self.transition(SessionState::ShutDown).await;
                return Ok(());
            }

            match self.connect_and_run(&mut backoff).await {
                Ok(()) => {
                    tracing::info!("Session stopped");
                    self.transition(SessionState::ShutDown).await;
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Session connection failed");
                    self.transition(SessionState::Disconnected).await;

                    let Some(delay) = backoff.next_delay() else {
                        return Err(SessionError::RetriesExhausted);
                    };
                    let attempt = backoff.attempt();
                    tracing::info!(attempt, delay_ms = delay.as_millis(), "Reconnecting");
                    self.transition(SessionState::Reconnecting { attempt }).await;

                    tokio::select! {
                        () = self.cancel.cancelled() => {
                            self.transition(SessionState::ShutDown).await;
                            return Ok(());
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// One connection attempt: open, handshake, then pump frames until
    /// cancellation or failure. `Ok(())` means cancelled.
    async fn connect_and_run(&self, backoff: &mut Backoff) -> Result<(), SessionError> {
        self.transition(SessionState::Connecting).await;

        let mut transport = tokio::select! {
            () = self.cancel.cancelled() => return Ok(()),
            result = self.connector.connect() => result?,
        };

        self.transition(SessionState::Authenticating).await;
        let mut handshake = Handshake::new(
            self.config.username.clone(),
            self.config.password.clone(),
            self.config.topics.clone(),
        );

        let mut last_inbound = Instant::now();

        let end = loop {
            let received = tokio::select! {
                () = self.cancel.cancelled() => break LoopEnd::Cancelled,
                r = tokio::time::timeout(
                    self.config.keepalive.ping_interval,
                    transport.next_frame(),
                ) => r,
            };

            match received {
                // Receive budget elapsed: check liveness, then probe.
                Err(_elapsed) => {
                    if last_inbound.elapsed() >= self.config.keepalive.idle_timeout {
                        break LoopEnd::Failed(SessionError::Transport(
                            TransportError::ConnectionLost("keep-alive timeout".to_string()),
                        ));
                    }
                    if let Err(e) = transport.send(Frame::Ping(Vec::new())).await {
                        break LoopEnd::Failed(e.into());
                    }
                }
                Ok(Ok(Some(frame))) => {
                    last_inbound = Instant::now();
                    match frame {
                        Frame::Text(text) => {
                            if let Err(e) = self
                                .handle_text(&text, &mut handshake, transport.as_mut(), backoff)
                                .await
                            {
                                break LoopEnd::Failed(e);
                            }
                        }
                        // Liveness already recorded above.
                        Frame::Ping(_) | Frame::Pong(_) => {}
                    }
                }
                Ok(Ok(None)) => break LoopEnd::Failed(SessionError::ConnectionClosed),
                Ok(Err(e)) => break LoopEnd::Failed(e.into()),
            }
        };

        // Close on every exit path, before the caller observes the outcome.
        let _ = transport.close().await;

        match end {
            LoopEnd::Cancelled => Ok(()),
            LoopEnd::Failed(e) => Err(e),
        }
    }

    /// Decode and dispatch one text frame.
    ///
    /// A malformed frame is logged and skipped; the session keeps running.
    async fn handle_text(
        &self,
        text: &str,
        handshake: &mut Handshake,
        transport: &mut dyn StreamTransport,
        backoff: &mut Backoff,
    ) -> Result<(), SessionError> {
        let message = match self.codec.decode(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed frame");
                return Ok(());
            }
        };

        if !handshake.is_active() {
            return self
                .advance_handshake(&message, handshake, transport, backoff)
                .await;
        }

        match message {
            FeedMessage::Status(update) => {
                let _ = self.event_tx.send(SessionEvent::Update(update)).await;
            }
            FeedMessage::Subscribed { entities } => {
                let _ = self.event_tx.send(SessionEvent::Subscribed(entities)).await;
            }
            FeedMessage::Error { code, msg } => {
                tracing::error!(code, msg = %msg, "Feed error");
            }
            other => {
                tracing::trace!(?other, "Ignoring control frame");
            }
        }
        Ok(())
    }

    async fn advance_handshake(
        &self,
        message: &FeedMessage,
        handshake: &mut Handshake,
        transport: &mut dyn StreamTransport,
        backoff: &mut Backoff,
    ) -> Result<(), SessionError> {
        match handshake.on_message(message)? {
            HandshakeStep::Send(request) => {
                if matches!(request, super::messages::ControlRequest::Subscribe { .. }) {
                    self.transition(SessionState::Subscribing).await;
                }
                let json = self.codec.encode(&request).map_err(|e| {
                    SessionError::Transport(TransportError::Send(e.to_string()))
                })?;
                transport.send(Frame::Text(json)).await?;
            }
            HandshakeStep::Active { session } => {
                tracing::info!(session = %session, "Session established");
                *self.session_id.write() = Some(session);
                backoff.reset();
                self.transition(SessionState::Active).await;
            }
            HandshakeStep::Pending => {}
        }
        Ok(())
    }

    async fn transition(&self, next: SessionState) {
        {
            let mut state = self.state.write();
            if *state == next {
                return;
            }
            *state = next;
        }
        let _ = self
            .event_tx
            .send(SessionEvent::StateChanged(next))
            .await;
    }
}
