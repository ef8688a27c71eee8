//! A real-socket [`TransportSender`]/[`TransportReceiver`] pair backed by
//! `tokio-tungstenite`, grounded on the same connect-and-split shape as
//! `signal_test_support::WsHarness` but implementing the session traits
//! instead of a standalone test harness.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use signal_client::{TransportError, TransportReceiver, TransportSender};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::MaybeTlsStream;

type WsStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub struct WsSender(futures_util::stream::SplitSink<WsStream, Message>);
pub struct WsReceiver(futures_util::stream::SplitStream<WsStream>);

pub async fn connect(url: &str, subprotocol: &str) -> Result<(WsSender, WsReceiver), TransportError> {
    use tokio_tungstenite::tungstenite::handshake::client::generate_key;
    use tokio_tungstenite::tungstenite::http::Request;

    let uri: tokio_tungstenite::tungstenite::http::Uri =
        url.parse().map_err(|e| TransportError::Send(format!("invalid url: {e}")))?;
    let host = uri.host().unwrap_or("localhost").to_owned();
    let host_header = match uri.port_u16() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    };
    let request = Request::builder()
        .uri(url)
        .header("Host", host_header)
        .header("Upgrade", "websocket")
        .header("Connection", "Upgrade")
        .header("Sec-WebSocket-Version", "13")
        .header("Sec-WebSocket-Key", generate_key())
        .header("Sec-WebSocket-Protocol", subprotocol)
        .body(())
        .map_err(|e| TransportError::Send(e.to_string()))?;

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| TransportError::Send(e.to_string()))?;
    let (write, read) = ws_stream.split();
    Ok((WsSender(write), WsReceiver(read)))
}

#[async_trait]
impl TransportSender for WsSender {
    async fn send(&mut self, payload: Bytes) -> Result<(), TransportError> {
        self.0
            .send(Message::Binary(payload))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.0
            .send(Message::Close(None))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}

#[async_trait]
impl TransportReceiver for WsReceiver {
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError> {
        loop {
            match self.0.next().await {
                Some(Ok(Message::Binary(bytes))) => return Ok(Some(bytes)),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(err)) => return Err(TransportError::Recv(err.to_string())),
                None => return Ok(None),
            }
        }
    }
}
