use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use signal_eventbus::EventBus;
use signal_protocol::extract_header;

use crate::error::{SessionError, TransportError};
use crate::hooks::SessionHooks;
use crate::transport::{TransportReceiver, TransportSender};

/// Default bound on `call_and_wait`'s suspension, per §5: "awaits have no
/// built-in timeout — implementations SHOULD add a bounded wait (recommended
/// default: 10s)".
pub const DEFAULT_CALL_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Dispatches an inbound frame for a protocol layer (peer-linker, ICE, ...)
/// built on top of a [`WebSocketSession`].
///
/// Implementations decide whether a frame belongs to their layer; if it
/// does not, they return `false` and the base session reports the frame as
/// unhandled (replying `Error(id)`).
#[async_trait]
pub trait FrameHandler<S: TransportSender>: Send + Sync {
    async fn handle_frame(
        &self,
        session: &Arc<WebSocketSession<S>>,
        id: u32,
        kind: u16,
        payload: Bytes,
    ) -> bool;

    /// The packet type this layer's server counterpart uses for `Error`.
    fn error_packet_type(&self) -> u16;
}

/// Owns a connection's write half and drives reads via a spawned task.
///
/// `call_and_wait` is the request/reply primitive every higher layer is
/// built on: it allocates a fresh id, registers an event handler, sends the
/// request, and suspends on the event bus until a reply for that id fires.
pub struct WebSocketSession<S: TransportSender> {
    sender: tokio::sync::Mutex<S>,
    events: EventBus,
    next_id: AtomicU32,
    disconnected: AtomicBool,
    hooks: Arc<dyn SessionHooks>,
    handler: Arc<dyn FrameHandler<S>>,
}

/// Event kind used for request/reply correlation: fires with `1` on
/// `Success`, `0` on `Error`.
pub const EVENT_RESULT: u32 = 1;

impl<S: TransportSender> WebSocketSession<S> {
    /// Spawns the reader task and returns the session handle. `handler`
    /// decides how inbound frames are dispatched; `hooks` is the
    /// application capability record.
    pub fn spawn<R: TransportReceiver>(
        sender: S,
        receiver: R,
        handler: Arc<dyn FrameHandler<S>>,
        hooks: Arc<dyn SessionHooks>,
    ) -> Arc<Self> {
        let session = Arc::new(WebSocketSession {
            sender: tokio::sync::Mutex::new(sender),
            events: EventBus::new(),
            next_id: AtomicU32::new(1),
            disconnected: AtomicBool::new(false),
            hooks,
            handler,
        });

        let read_session = session.clone();
        tokio::spawn(async move {
            read_session.run_reader_loop(receiver).await;
        });

        session
    }

    async fn run_reader_loop<R: TransportReceiver>(self: Arc<Self>, mut receiver: R) {
        loop {
            match receiver.recv().await {
                Ok(Some(frame)) => {
                    self.dispatch_frame(frame).await;
                }
                Ok(None) => {
                    tracing::info!("websocket session: peer closed the connection");
                    break;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "websocket session: transport read error");
                    break;
                }
            }
        }
        self.stop().await;
    }

    async fn dispatch_frame(self: &Arc<Self>, frame: Bytes) {
        let (header, payload) = match extract_header(frame) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(error = %err, "websocket session: dropping malformed frame");
                let _ = self.send_error(self.handler.error_packet_type(), 0).await;
                return;
            }
        };
        let consumed = self.handler.handle_frame(self, header.id, header.kind, payload).await;
        if !consumed {
            tracing::warn!(kind = header.kind, id = header.id, "websocket session: unhandled packet type");
            let _ = self.send_error(self.handler.error_packet_type(), header.id).await;
        }
    }

    async fn send_error(&self, error_type: u16, id: u32) -> Result<(), TransportError> {
        self.send_packet(error_type, id, Bytes::new()).await
    }

    /// Sends a bare `Success`-shaped reply (no payload) for `kind`/`id`.
    pub async fn send_result(&self, kind: u16, id: u32) -> Result<(), TransportError> {
        self.send_packet(kind, id, Bytes::new()).await
    }

    /// Encodes a `(kind, id) | payload` frame and sends it. Used for
    /// arbitrary application frames (passthrough data) that a higher layer
    /// does not have a `signal-protocol` type for.
    pub async fn send_packet(&self, kind: u16, id: u32, payload: Bytes) -> Result<(), TransportError> {
        use bytes::BufMut;
        let mut out = bytes::BytesMut::with_capacity(6 + payload.len());
        out.put_u16_le(kind);
        out.put_u32_le(id);
        out.put_slice(&payload);
        self.send_raw(out.freeze()).await
    }

    /// Sends a raw, already-framed payload. Higher layers encode with
    /// `signal-protocol` and call this.
    pub async fn send_raw(&self, payload: Bytes) -> Result<(), TransportError> {
        let mut sender = self.sender.lock().await;
        sender.send(payload).await
    }

    /// Fires the event registered for `(kind, id)`; used by layers when a
    /// reply for an in-flight request arrives.
    pub fn fire_event(&self, kind: u32, id: u32, value: u32) {
        self.events.invoke(kind, id, value);
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    pub fn hooks(&self) -> &Arc<dyn SessionHooks> {
        &self.hooks
    }

    pub fn next_request_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn is_connected(&self) -> bool {
        !self.disconnected.load(Ordering::SeqCst)
    }

    /// Sends `payload` and suspends until a reply fires for `(kind, id)`,
    /// bounded by [`DEFAULT_CALL_TIMEOUT`].
    pub async fn call_and_wait(
        &self,
        kind: u32,
        id: u32,
        payload: Bytes,
    ) -> Result<u32, SessionError> {
        self.call_and_wait_timeout(kind, id, payload, DEFAULT_CALL_TIMEOUT).await
    }

    /// As `call_and_wait`, with an explicit bound instead of the default.
    pub async fn call_and_wait_timeout(
        &self,
        kind: u32,
        id: u32,
        payload: Bytes,
        timeout: std::time::Duration,
    ) -> Result<u32, SessionError> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }
        // Register before sending: `send_raw` yields to the reader task, and a
        // fast reply could otherwise be dispatched before a lazily-polled
        // `wait` future ever adds its handler. `register` adds it synchronously.
        let waiter = self.events.register(kind, id);
        self.send_raw(payload).await?;
        tokio::time::timeout(timeout, waiter).await.map_err(|_| SessionError::Timeout)
    }

    /// Idempotent shutdown: drains the event bus, closes the transport, and
    /// invokes the `on_disconnected` hook. Safe to call more than once.
    pub async fn stop(&self) {
        if self.disconnected.swap(true, Ordering::SeqCst) {
            return;
        }
        self.events.drain();
        let _ = self.sender.lock().await.close().await;
        self.hooks.on_disconnected().await;
    }
}
