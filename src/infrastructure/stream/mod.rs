//! Streaming Stack
//!
//! TLS WebSocket transport, the session state machine layered on it, the
//! JSON wire codec, and the reconnect backoff policy.

pub mod backoff;
pub mod codec;
pub mod handshake;
pub mod messages;
pub mod session;
pub mod transport;

pub use backoff::{Backoff, BackoffConfig};
pub use codec::{CodecError, FeedCodec};
pub use handshake::{Handshake, HandshakeError, HandshakePhase, HandshakeStep};
pub use messages::{ControlRequest, FeedMessage};
pub use session::{
    KeepaliveConfig, SessionConfig, SessionError, SessionEvent, SessionManager, SessionState,
};
pub use transport::{WsConnector, WsConnectorConfig};
