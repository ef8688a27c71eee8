use thiserror::Error;

/// Errors surfaced by the transport the session is built on (a WebSocket
/// connection in production, an in-memory duplex pair in tests).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,
    #[error("transport send failed: {0}")]
    Send(String),
    #[error("transport receive failed: {0}")]
    Recv(String),
}

/// Errors a session-layer call can fail with.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("not connected")]
    NotConnected,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Framing(#[from] signal_protocol::FramingError),
    #[error("timed out waiting for a reply")]
    Timeout,
}
