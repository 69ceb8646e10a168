//! Transport Ports
//!
//! Seams between the session manager and the concrete wire transport.
//! The session manager only ever talks to these traits, so tests inject
//! fake transports and the production binary injects the TLS WebSocket
//! adapter from `infrastructure::stream`.

use async_trait::async_trait;

// =============================================================================
// Frames
// =============================================================================

/// One message-oriented frame on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A text payload (JSON in the concrete protocol).
    Text(String),
    /// Keep-alive probe.
    Ping(Vec<u8>),
    /// Keep-alive reply.
    Pong(Vec<u8>),
}

// =============================================================================
// Errors
// =============================================================================

/// Transport-layer failures.
///
/// Transient I/O failures surface as [`TransportError::ConnectionLost`]
/// rather than being retried internally; retry policy belongs to the
/// session manager.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// DNS, TCP, TLS, or protocol handshake failure while connecting.
    #[error("connect failed: {0}")]
    Connect(String),

    /// TLS configuration could not be built.
    #[error("TLS setup failed: {0}")]
    Tls(String),

    /// A write failed; the connection is no longer usable.
    #[error("send failed: {0}")]
    Send(String),

    /// The peer closed or reset the connection, or keep-alive timed out.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// Operation attempted on a closed transport.
    #[error("transport is closed")]
    Closed,
}

// =============================================================================
// Ports
// =============================================================================

/// One active, message-oriented connection.
///
/// `next_frame` suspends the caller until a frame arrives, the peer closes
/// cleanly (`Ok(None)`), or the connection fails. The frame sequence is
/// infinite until close and not restartable; after an error or a clean
/// close the transport must be discarded.
#[async_trait]
pub trait StreamTransport: Send {
    /// Send one frame.
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError>;

    /// Receive the next frame. `Ok(None)` signals a clean close.
    async fn next_frame(&mut self) -> Result<Option<Frame>, TransportError>;

    /// Close the connection. Idempotent; releases resources on every path.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Factory for [`StreamTransport`]s, one per connection attempt.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    /// Open a new connection to the configured endpoint.
    async fn connect(&self) -> Result<Box<dyn StreamTransport>, TransportError>;
}
