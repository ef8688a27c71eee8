use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;

/// The write half of a connection. Implemented for WebSocket client
/// connections in production and for the in-memory duplex pair used in
/// tests (`signal-test-support`).
#[async_trait]
pub trait TransportSender: Send + 'static {
    async fn send(&mut self, payload: Bytes) -> Result<(), TransportError>;
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// The read half of a connection. Yields `None` once the peer has closed
/// the connection cleanly.
#[async_trait]
pub trait TransportReceiver: Send + 'static {
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError>;
}
