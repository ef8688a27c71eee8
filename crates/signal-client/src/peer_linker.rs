//! Pad registration, linking, and authentication on top of [`WebSocketSession`].
//!
//! This is the layer described as "PeerLinkerSession" in the design notes:
//! composition instead of inheritance. [`PeerLinkerSession`] owns a
//! `WebSocketSession` directly and the packet handling it needs is the free
//! function [`dispatch`], reused as-is by the ICE layer built on top of it.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use signal_protocol::peer_linker::{self as wire, Body};
use signal_protocol::NO_ID;

use crate::hooks::SessionHooks;
use crate::transport::TransportSender;
use crate::ws_session::{FrameHandler, WebSocketSession, EVENT_RESULT};

/// Event kind fired when a link attempt resolves, either way, always with
/// `id = NO_ID` since it is not itself a reply to a specific request.
pub const EVENT_LINKED: u32 = 2;

/// Parameters for [`PeerLinkerSession::start`].
#[derive(Debug, Clone)]
pub struct StartParams {
    pub pad_name: String,
    pub target_pad_name: Option<String>,
}

/// Shared dispatch logic for frames a peer-linker-speaking client receives.
/// Returns `false` for packet types this layer does not recognize, so a
/// caller (e.g. [`crate::ice::IceHandler`]) can try its own types next.
pub(crate) async fn dispatch<S: TransportSender>(
    session: &Arc<WebSocketSession<S>>,
    id: u32,
    kind: u16,
    payload: Bytes,
) -> bool {
    let body = match wire::decode_body(kind, payload) {
        Ok(body) => body,
        Err(err) => {
            tracing::warn!(error = %err, kind, id, "peer-linker: malformed frame");
            return false;
        }
    };
    match body {
        Body::Success => {
            session.fire_event(EVENT_RESULT, id, 1);
            true
        }
        Body::Error => {
            session.fire_event(EVENT_RESULT, id, 0);
            true
        }
        Body::LinkAuth { requester_name, secret } => {
            let ok = session.hooks().auth_peer(&requester_name, &secret).await;
            let reply_id = session.next_request_id();
            let reply = wire::encode(reply_id, &Body::LinkAuthResponse { ok, requester_name });
            if let Err(err) = session.send_raw(reply).await {
                tracing::warn!(error = %err, "peer-linker: failed to send LinkAuthResponse");
            }
            true
        }
        Body::LinkSuccess => {
            session.fire_event(EVENT_LINKED, NO_ID, 1);
            true
        }
        Body::LinkDenied => {
            session.fire_event(EVENT_LINKED, NO_ID, 0);
            true
        }
        Body::Unlinked => {
            session.fire_event(EVENT_LINKED, NO_ID, 0);
            true
        }
        Body::Passthrough { payload, .. } => {
            session.hooks().on_p2p_packet_received(payload).await;
            true
        }
        // Register/Unregister/Link/Unlink/SetCandidates/AddCandidates/GatheringDone
        // are requests a client sends, never receives; SetCandidates and
        // friends are handled one layer up by IceSession if present.
        _ => false,
    }
}

pub(crate) struct PeerLinkerHandler;

#[async_trait]
impl<S: TransportSender> FrameHandler<S> for PeerLinkerHandler {
    async fn handle_frame(
        &self,
        session: &Arc<WebSocketSession<S>>,
        id: u32,
        kind: u16,
        payload: Bytes,
    ) -> bool {
        dispatch(session, id, kind, payload).await
    }

    fn error_packet_type(&self) -> u16 {
        wire::ERROR
    }
}

/// Client-side pad session: register a name, optionally link to a peer, and
/// send/receive passthrough application frames once linked.
pub struct PeerLinkerSession<S: TransportSender> {
    ws: Arc<WebSocketSession<S>>,
}

impl<S: TransportSender> PeerLinkerSession<S> {
    pub fn spawn<R: crate::transport::TransportReceiver>(
        sender: S,
        receiver: R,
        hooks: Arc<dyn SessionHooks>,
    ) -> Self {
        let handler: Arc<dyn FrameHandler<S>> = Arc::new(PeerLinkerHandler);
        let ws = WebSocketSession::spawn(sender, receiver, handler, hooks);
        PeerLinkerSession { ws }
    }

    /// Wraps an already-spawned session built by a subclassing layer (e.g.
    /// [`crate::ice::IceSession`] reuses this to run the same register/link
    /// sequence over its own handler).
    pub(crate) fn from_ws(ws: Arc<WebSocketSession<S>>) -> Self {
        PeerLinkerSession { ws }
    }

    pub fn ws(&self) -> &Arc<WebSocketSession<S>> {
        &self.ws
    }

    pub fn is_connected(&self) -> bool {
        self.ws.is_connected()
    }

    pub async fn stop(&self) {
        self.ws.stop().await;
    }

    /// Registers `params.pad_name`, and if `target_pad_name` is set, links
    /// to it. Returns `false` on any step's failure, matching the reference
    /// "start" semantics: connect, register, optionally link, all-or-nothing.
    pub async fn start(&self, params: StartParams) -> bool {
        if !self.register(&params.pad_name).await {
            return false;
        }
        match params.target_pad_name {
            Some(target) if !target.is_empty() => self.link(&target).await,
            _ => true,
        }
    }

    pub async fn register(&self, pad_name: &str) -> bool {
        let id = self.ws.next_request_id();
        let payload = wire::encode(id, &Body::Register { pad_name: pad_name.to_owned() });
        let ok = matches!(self.ws.call_and_wait(EVENT_RESULT, id, payload).await, Ok(1));
        if ok {
            self.ws.hooks().on_pad_created().await;
        }
        ok
    }

    pub async fn unregister(&self) -> bool {
        let id = self.ws.next_request_id();
        let payload = wire::encode(id, &Body::Unregister);
        matches!(self.ws.call_and_wait(EVENT_RESULT, id, payload).await, Ok(1))
    }

    /// Issues `Link(target, secret)` using the hooks-supplied secret, waits
    /// for the server's immediate `Success`/`Error` ack, then separately
    /// awaits the out-of-band `Linked` event fired by `LinkSuccess`/`LinkDenied`.
    pub async fn link(&self, target_pad_name: &str) -> bool {
        let secret = self.ws.hooks().get_auth_secret();
        let id = self.ws.next_request_id();
        let payload = wire::encode(
            id,
            &Body::Link { requestee_name: target_pad_name.to_owned(), secret },
        );
        // Registered before the request goes out: the server's ordering of
        // the `Success` ack versus the out-of-band `LinkSuccess`/`LinkDenied`
        // is not guaranteed, so both handlers must exist before either frame
        // can arrive.
        let linked = self.ws.event_bus().register(EVENT_LINKED, NO_ID);
        match self.ws.call_and_wait(EVENT_RESULT, id, payload).await {
            Ok(1) => {}
            _ => return false,
        }
        linked.await == 1
    }

    pub async fn unlink(&self) -> bool {
        let id = self.ws.next_request_id();
        let payload = wire::encode(id, &Body::Unlink);
        matches!(self.ws.call_and_wait(EVENT_RESULT, id, payload).await, Ok(1))
    }

    /// Sends an arbitrary application frame; once linked, the server
    /// passthrough-routes any type code it does not itself recognize.
    pub async fn send_passthrough(&self, kind: u16, payload: Bytes) -> bool {
        let id = self.ws.next_request_id();
        self.ws.send_packet(kind, id, payload).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::NoopHooks;
    use signal_test_support::duplex_transport;

    struct AllowHooks(Vec<u8>);

    #[async_trait]
    impl SessionHooks for AllowHooks {
        async fn auth_peer(&self, _peer_name: &str, secret: &[u8]) -> bool {
            secret == self.0.as_slice()
        }
        fn get_auth_secret(&self) -> Vec<u8> {
            self.0.clone()
        }
    }

    struct RecordingHooks {
        received: std::sync::Mutex<Vec<Bytes>>,
    }

    #[async_trait]
    impl SessionHooks for RecordingHooks {
        async fn on_p2p_packet_received(&self, payload: Bytes) {
            self.received.lock().unwrap().push(payload);
        }
    }

    #[tokio::test]
    async fn register_succeeds_against_a_server_stub() {
        let (client_pair, server_pair) = duplex_transport::pair();
        let session = PeerLinkerSession::spawn(client_pair.sender, client_pair.receiver, Arc::new(NoopHooks));

        let mut server = server_pair;
        tokio::spawn(async move {
            let frame = server.receiver.recv().await.unwrap().unwrap();
            let (id, body) = wire::decode(frame).unwrap();
            assert!(matches!(body, Body::Register { .. }));
            let reply = wire::encode(id, &Body::Success);
            server.sender.send(reply).await.unwrap();
        });

        assert!(session.register("agent a").await);
    }

    #[tokio::test]
    async fn link_flow_resolves_after_link_success_event() {
        let (client_pair, mut server_pair) = duplex_transport::pair();
        let hooks = Arc::new(AllowHooks(b"password".to_vec()));
        let session = PeerLinkerSession::spawn(client_pair.sender, client_pair.receiver, hooks);

        tokio::spawn(async move {
            // Link() -> Success ack.
            let frame = server_pair.receiver.recv().await.unwrap().unwrap();
            let (id, body) = wire::decode(frame).unwrap();
            assert!(matches!(body, Body::Link { .. }));
            server_pair.sender.send(wire::encode(id, &Body::Success)).await.unwrap();
            // Then, out of band, the server announces LinkSuccess.
            server_pair
                .sender
                .send(wire::encode(signal_protocol::NO_ID, &Body::LinkSuccess))
                .await
                .unwrap();
        });

        assert!(session.link("agent b").await);
    }

    #[tokio::test]
    async fn link_denied_resolves_to_false() {
        let (client_pair, mut server_pair) = duplex_transport::pair();
        let session = PeerLinkerSession::spawn(client_pair.sender, client_pair.receiver, Arc::new(NoopHooks));

        tokio::spawn(async move {
            let frame = server_pair.receiver.recv().await.unwrap().unwrap();
            let (id, _) = wire::decode(frame).unwrap();
            server_pair.sender.send(wire::encode(id, &Body::Success)).await.unwrap();
            server_pair
                .sender
                .send(wire::encode(signal_protocol::NO_ID, &Body::LinkDenied))
                .await
                .unwrap();
        });

        assert!(!session.link("agent b").await);
    }

    #[tokio::test]
    async fn link_auth_is_answered_using_the_auth_peer_hook() {
        let (client_pair, mut server_pair) = duplex_transport::pair();
        let hooks = Arc::new(AllowHooks(b"secret".to_vec()));
        let _session = PeerLinkerSession::spawn(client_pair.sender, client_pair.receiver, hooks);

        let frame = wire::encode(
            99,
            &Body::LinkAuth { requester_name: "agent a".to_owned(), secret: b"secret".to_vec() },
        );
        server_pair.sender.send(frame).await.unwrap();

        let reply = server_pair.receiver.recv().await.unwrap().unwrap();
        let (_, body) = wire::decode(reply).unwrap();
        assert_eq!(body, Body::LinkAuthResponse { ok: true, requester_name: "agent a".to_owned() });
    }

    #[tokio::test]
    async fn unknown_type_reaches_the_p2p_hook() {
        let (client_pair, mut server_pair) = duplex_transport::pair();
        let hooks = Arc::new(RecordingHooks { received: std::sync::Mutex::new(Vec::new()) });
        let _session = PeerLinkerSession::spawn(client_pair.sender, client_pair.receiver, hooks.clone());

        let frame = wire::encode(0, &Body::Passthrough { kind: 999, payload: Bytes::from_static(b"hi") });
        server_pair.sender.send(frame).await.unwrap();

        // Give the reader task a moment to dispatch.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(hooks.received.lock().unwrap().as_slice(), &[Bytes::from_static(b"hi")]);
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_unblocks_pending_waiters() {
        let (client_pair, _server_pair) = duplex_transport::pair();
        let session = PeerLinkerSession::spawn(client_pair.sender, client_pair.receiver, Arc::new(NoopHooks));
        session.stop().await;
        session.stop().await;
        assert!(!session.is_connected());
    }
}
