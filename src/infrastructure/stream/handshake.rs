//! Session Handshake
//!
//! State machine for the logical session establishment on a fresh
//! connection: wait for the server greeting, authenticate, then subscribe.
//! The session manager feeds decoded frames in and sends whatever request
//! the machine hands back.
//!
//! # Flow
//!
//! ```text
//! server: {"type":"welcome"}
//! client: {"type":"auth","username":…,"password":…}
//! server: {"type":"auth_ok","session":"…"}
//! client: {"type":"subscribe","entities":[…]}
//! server: {"type":"subscribed","entities":[…]}
//! ```
//!
//! The machine is rebuilt for every connection attempt; the remote is
//! never assumed to have preserved prior session state.

use thiserror::Error;

use super::messages::{ControlRequest, FeedMessage};
use crate::domain::status::EntityId;

// =============================================================================
// Errors
// =============================================================================

/// Handshake failures. All of them abort the current connection attempt.
#[derive(Debug, Clone, Error)]
pub enum HandshakeError {
    /// The server rejected the handshake.
    #[error("handshake rejected ({code}): {msg}")]
    Rejected {
        /// Server error code.
        code: i32,
        /// Server error message.
        msg: String,
    },

    /// The server sent a frame that is invalid in the current phase.
    #[error("protocol violation during {phase:?}: {detail}")]
    Protocol {
        /// Phase the machine was in.
        phase: HandshakePhase,
        /// What went wrong.
        detail: String,
    },
}

// =============================================================================
// Phases
// =============================================================================

/// Phase of the logical session handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandshakePhase {
    /// Waiting for the server greeting.
    #[default]
    Unauthenticated,
    /// Auth request sent, awaiting confirmation.
    Authenticating,
    /// Subscribe request sent, awaiting confirmation.
    Subscribing,
    /// Fully established.
    Active,
    /// Aborted; the connection must be dropped.
    Failed,
}

/// What the session manager should do after feeding a frame in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeStep {
    /// Send this request and keep feeding frames.
    Send(ControlRequest),
    /// The session is established under the given remote-issued id.
    Active {
        /// Session identifier issued by the remote.
        session: String,
    },
    /// Nothing to do yet.
    Pending,
}

// =============================================================================
// State machine
// =============================================================================

/// Drives one connect/authenticate/subscribe sequence.
#[derive(Debug)]
pub struct Handshake {
    username: String,
    password: String,
    topics: Vec<EntityId>,
    phase: HandshakePhase,
    session_id: Option<String>,
}

impl Handshake {
    /// Create a handshake for one connection attempt.
    #[must_use]
    pub fn new(username: String, password: String, topics: Vec<EntityId>) -> Self {
        Self {
            username,
            password,
            topics,
            phase: HandshakePhase::Unauthenticated,
            session_id: None,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> HandshakePhase {
        self.phase
    }

    /// Remote-issued session id, available once authenticated.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Whether the handshake has completed.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.phase, HandshakePhase::Active)
    }

    /// Feed one decoded frame into the machine.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError`] on rejection or protocol violation; the
    /// caller must drop the connection and reconnect from scratch.
    pub fn on_message(&mut self, msg: &FeedMessage) -> Result<HandshakeStep, HandshakeError> {
        match (self.phase, msg) {
            (HandshakePhase::Unauthenticated, FeedMessage::Welcome) => {
                self.phase = HandshakePhase::Authenticating;
                Ok(HandshakeStep::Send(ControlRequest::Auth {
                    username: self.username.clone(),
                    password: self.password.clone(),
                }))
            }
            (HandshakePhase::Authenticating, FeedMessage::AuthOk { session }) => {
                self.phase = HandshakePhase::Subscribing;
                self.session_id = Some(session.clone());
                Ok(HandshakeStep::Send(ControlRequest::Subscribe {
                    entities: self.topics.clone(),
                }))
            }
            (HandshakePhase::Subscribing, FeedMessage::Subscribed { entities }) => {
                self.phase = HandshakePhase::Active;
                tracing::debug!(count = entities.len(), "Subscription confirmed");
                let session = self.session_id.clone().ok_or(HandshakeError::Protocol {
                    phase: HandshakePhase::Subscribing,
                    detail: "subscribed before auth_ok".to_string(),
                })?;
                Ok(HandshakeStep::Active { session })
            }
            (_, FeedMessage::Error { code, msg }) => {
                self.phase = HandshakePhase::Failed;
                Err(HandshakeError::Rejected {
                    code: *code,
                    msg: msg.clone(),
                })
            }
            (HandshakePhase::Active, _) => Ok(HandshakeStep::Pending),
            (phase, other) => {
                self.phase = HandshakePhase::Failed;
                Err(HandshakeError::Protocol {
                    phase,
                    detail: format!("unexpected frame: {other:?}"),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handshake() -> Handshake {
        Handshake::new(
            "monitor".to_string(),
            "secret".to_string(),
            vec!["district".to_string()],
        )
    }

    #[test]
    fn full_sequence_reaches_active() {
        let mut hs = handshake();
        assert_eq!(hs.phase(), HandshakePhase::Unauthenticated);

        let step = hs.on_message(&FeedMessage::Welcome).unwrap();
        assert!(matches!(step, HandshakeStep::Send(ControlRequest::Auth { .. })));
        assert_eq!(hs.phase(), HandshakePhase::Authenticating);

        let step = hs
            .on_message(&FeedMessage::AuthOk {
                session: "s-1".to_string(),
            })
            .unwrap();
        assert!(matches!(
            step,
            HandshakeStep::Send(ControlRequest::Subscribe { .. })
        ));
        assert_eq!(hs.phase(), HandshakePhase::Subscribing);

        let step = hs
            .on_message(&FeedMessage::Subscribed {
                entities: vec!["district".to_string()],
            })
            .unwrap();
        assert_eq!(
            step,
            HandshakeStep::Active {
                session: "s-1".to_string(),
            }
        );
        assert!(hs.is_active());
        assert_eq!(hs.session_id(), Some("s-1"));
    }

    #[test]
    fn rejection_fails_the_handshake() {
        let mut hs = handshake();
        hs.on_message(&FeedMessage::Welcome).unwrap();

        let err = hs
            .on_message(&FeedMessage::Error {
                code: 401,
                msg: "bad credentials".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, HandshakeError::Rejected { code: 401, .. }));
        assert_eq!(hs.phase(), HandshakePhase::Failed);
    }

    #[test]
    fn status_before_active_is_a_protocol_violation() {
        let mut hs = handshake();
        let err = hs
            .on_message(&FeedMessage::Subscribed { entities: vec![] })
            .unwrap_err();
        assert!(matches!(err, HandshakeError::Protocol { .. }));
    }

    #[test]
    fn frames_after_active_are_ignored() {
        let mut hs = handshake();
        hs.on_message(&FeedMessage::Welcome).unwrap();
        hs.on_message(&FeedMessage::AuthOk {
            session: "s-1".to_string(),
        })
        .unwrap();
        hs.on_message(&FeedMessage::Subscribed { entities: vec![] })
            .unwrap();

        let step = hs.on_message(&FeedMessage::Welcome).unwrap();
        assert_eq!(step, HandshakeStep::Pending);
    }
}
