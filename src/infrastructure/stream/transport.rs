//! WebSocket Transport
//!
//! TLS-wrapped, message-oriented transport over tokio-tungstenite. Owns
//! exactly one connection; reconnect policy lives in the session manager.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream, connect_async_tls_with_config};

use crate::application::ports::{Frame, StreamTransport, TransportConnector, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// Connection state
// =============================================================================

/// Lifecycle state of one transport link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No link, or the link has been torn down.
    #[default]
    Disconnected,
    /// TCP/TLS/WebSocket handshake in progress.
    Connecting,
    /// Link established and usable.
    Connected,
    /// Close initiated, resources being released.
    Closing,
}

// =============================================================================
// Connector
// =============================================================================

/// Configuration for the WebSocket connector.
#[derive(Debug, Clone)]
pub struct WsConnectorConfig {
    /// Full `wss://` endpoint URL.
    pub url: String,
    /// Verify the server certificate against the system trust roots.
    /// Disabling this is only acceptable against development endpoints.
    pub verify_peer: bool,
}

/// Opens TLS WebSocket connections to one configured endpoint.
#[derive(Debug, Clone)]
pub struct WsConnector {
    config: WsConnectorConfig,
}

impl WsConnector {
    /// Create a connector for the given endpoint.
    #[must_use]
    pub const fn new(config: WsConnectorConfig) -> Self {
        Self { config }
    }

    fn tls_connector(&self) -> Result<Option<Connector>, TransportError> {
        if self.config.verify_peer {
            // Default path: tokio-tungstenite builds a rustls config with
            // the bundled webpki roots.
            return Ok(None);
        }
        let provider = rustls::crypto::ring::default_provider();
        let tls = rustls::ClientConfig::builder_with_provider(Arc::new(provider.clone()))
            .with_safe_default_protocol_versions()
            .map_err(|e| TransportError::Tls(e.to_string()))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(InsecureVerifier { provider }))
            .with_no_client_auth();
        Ok(Some(Connector::Rustls(Arc::new(tls))))
    }
}

#[async_trait]
impl TransportConnector for WsConnector {
    async fn connect(&self) -> Result<Box<dyn StreamTransport>, TransportError> {
        let connector = self.tls_connector()?;

        tracing::debug!(url = %self.config.url, "Opening WebSocket connection");
        let (ws, _response) =
            connect_async_tls_with_config(self.config.url.as_str(), None, false, connector)
                .await
                .map_err(|e| TransportError::Connect(e.to_string()))?;

        Ok(Box::new(WsTransport::new(ws)))
    }
}

// =============================================================================
// Transport
// =============================================================================

/// One live WebSocket connection.
pub struct WsTransport {
    ws: WsStream,
    state: ConnectionState,
}

impl WsTransport {
    fn new(ws: WsStream) -> Self {
        Self {
            ws,
            state: ConnectionState::Connected,
        }
    }
}

#[async_trait]
impl StreamTransport for WsTransport {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        if self.state != ConnectionState::Connected {
            return Err(TransportError::Closed);
        }
        let message = match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Ping(data) => Message::Ping(data.into()),
            Frame::Pong(data) => Message::Pong(data.into()),
        };
        self.ws.send(message).await.map_err(|e| {
            self.state = ConnectionState::Disconnected;
            TransportError::Send(e.to_string())
        })?;
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<Frame>, TransportError> {
        if self.state != ConnectionState::Connected {
            return Err(TransportError::Closed);
        }
        loop {
            match self.ws.next().await {
                Some(Ok(message)) => {
                    match message {
                        Message::Text(text) => return Ok(Some(Frame::Text(text.to_string()))),
                        Message::Ping(data) => {
                            // Answer the probe; the payload is echoed back.
                            self.ws
                                .send(Message::Pong(data))
                                .await
                                .map_err(|e| TransportError::Send(e.to_string()))?;
                        }
                        Message::Pong(data) => return Ok(Some(Frame::Pong(data.to_vec()))),
                        Message::Close(_) => {
                            self.state = ConnectionState::Disconnected;
                            return Ok(None);
                        }
                        // Binary and raw frames are not part of the protocol.
                        _ => {}
                    }
                }
                Some(Err(e)) => {
                    self.state = ConnectionState::Disconnected;
                    return Err(TransportError::ConnectionLost(e.to_string()));
                }
                None => {
                    self.state = ConnectionState::Disconnected;
                    return Ok(None);
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.state == ConnectionState::Disconnected {
            return Ok(());
        }
        self.state = ConnectionState::Closing;
        // Best effort: the peer may already be gone.
        let _ = self.ws.close(None).await;
        self.state = ConnectionState::Disconnected;
        Ok(())
    }
}

// =============================================================================
// TLS
// =============================================================================

/// Certificate verifier that accepts any server certificate.
///
/// Installed only when `verify_peer` is explicitly disabled; signature
/// verification still runs so the handshake remains well-formed.
#[derive(Debug)]
struct InsecureVerifier {
    provider: rustls::crypto::CryptoProvider,
}

impl rustls::client::danger::ServerCertVerifier for InsecureVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
