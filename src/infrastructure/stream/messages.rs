//! Wire Message Types
//!
//! Types for the JSON frames exchanged with the status feed. Every frame
//! is a single JSON object with a `type` discriminator.
//!
//! # Inbound
//!
//! ```json
//! {"type": "welcome"}
//! {"type": "auth_ok", "session": "f81a…"}
//! {"type": "subscribed", "entities": ["district", "victoria"]}
//! {"type": "error", "code": 401, "msg": "bad credentials"}
//! {"type": "status", "entity": "district", "status": "Degraded",
//!  "ts": "2026-03-01T08:15:00Z"}
//! ```
//!
//! # Outbound
//!
//! ```json
//! {"type": "auth", "username": "…", "password": "…"}
//! {"type": "subscribe", "entities": ["district", "victoria"]}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::status::{EntityId, Status, StatusUpdate};

// =============================================================================
// Inbound
// =============================================================================

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedMessage {
    /// Server greeting; the client must now authenticate.
    Welcome,
    /// Authentication accepted; carries the remote-issued session id.
    AuthOk {
        /// Session identifier issued by the remote.
        session: String,
    },
    /// Subscription confirmed for the listed entities.
    Subscribed {
        /// Entities the subscription now covers.
        entities: Vec<EntityId>,
    },
    /// Error reported by the server.
    Error {
        /// Numeric error code.
        code: i32,
        /// Human-readable description.
        msg: String,
    },
    /// A status update for one entity.
    Status(StatusUpdate),
}

/// Wire shape of an `auth_ok` frame.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AuthOkBody {
    pub session: String,
}

/// Wire shape of a `subscribed` frame.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SubscribedBody {
    #[serde(default)]
    pub entities: Vec<EntityId>,
}

/// Wire shape of an `error` frame.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    pub code: i32,
    pub msg: String,
}

/// Wire shape of a `status` frame.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StatusBody {
    pub entity: EntityId,
    pub status: Status,
    pub ts: DateTime<Utc>,
}

impl From<StatusBody> for StatusUpdate {
    fn from(body: StatusBody) -> Self {
        Self {
            entity: body.entity,
            status: body.status,
            timestamp: body.ts,
        }
    }
}

// =============================================================================
// Outbound
// =============================================================================

/// Control requests sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlRequest {
    /// Authenticate the session.
    Auth {
        /// Account name.
        username: String,
        /// Account secret.
        password: String,
    },
    /// Subscribe to status updates for the listed entities.
    Subscribe {
        /// Entity identifiers to subscribe to.
        entities: Vec<EntityId>,
    },
}
