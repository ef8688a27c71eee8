//! Drives the ICE handshake on top of [`PeerLinkerSession`], then hands off
//! to a direct UDP agent for application traffic.
//!
//! The UDP/STUN/TURN agent itself is out of scope (§1, §6 of the design):
//! this module only defines the trait boundary ([`IceAgent`]/[`AgentSink`])
//! a production agent would implement, plus the protocol glue that drives
//! it from inbound `SetCandidates`/`AddCandidates`/`GatheringDone` frames.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use signal_protocol::peer_linker::{self as wire, Body};
use signal_protocol::NO_ID;

use crate::hooks::SessionHooks;
use crate::peer_linker::{self, PeerLinkerSession, StartParams};
use crate::transport::{TransportReceiver, TransportSender};
use crate::ws_session::{FrameHandler, WebSocketSession};

/// The ICE/STUN/TURN UDP agent contract consumed by [`IceSession`] (§6).
/// A production implementation is out of scope for this repository; see
/// `signal-test-support::PairedIceAgent` for a deterministic test double.
#[async_trait]
pub trait IceAgent: Send + Sync {
    /// Initializes the agent with STUN/TURN configuration and a local bind
    /// address, wiring `sink` as the callback target. Gathering starts
    /// immediately; `sink.on_local_candidate`/`on_gathering_done` fire as
    /// candidates become available.
    async fn init(&self, stun: &str, turn: &[String], bind_address: &str, sink: Arc<dyn AgentSink>);
    async fn local_description(&self) -> String;
    async fn set_remote_description(&self, sdp: String);
    async fn add_remote_candidate(&self, sdp: String);
    async fn set_remote_gathering_done(&self);
    /// Sends bytes over the direct channel; fails if not yet connected.
    async fn send(&self, payload: Bytes) -> bool;
}

/// Callback sink an [`IceAgent`] drives; implemented internally by
/// [`IceSession`] and handed to the agent at `init` time.
#[async_trait]
pub trait AgentSink: Send + Sync {
    async fn on_local_candidate(&self, sdp: String);
    async fn on_gathering_done(&self);
    async fn on_state(&self, connected: bool);
    async fn on_recv(&self, payload: Bytes);
}

/// Event kinds specific to the ICE layer (on top of the peer-linker set).
pub const EVENT_SDP_SET: u32 = 10;
pub const EVENT_GATHERING_DONE: u32 = 11;
pub const EVENT_CONNECTED: u32 = 12;

pub(crate) struct IceHandler {
    agent: Arc<dyn IceAgent>,
}

#[async_trait]
impl<S: TransportSender> FrameHandler<S> for IceHandler {
    async fn handle_frame(
        &self,
        session: &Arc<WebSocketSession<S>>,
        id: u32,
        kind: u16,
        payload: Bytes,
    ) -> bool {
        if peer_linker::dispatch(session, id, kind, payload.clone()).await {
            return true;
        }
        match wire::decode_body(kind, payload) {
            Ok(Body::SetCandidates { sdp }) => {
                self.agent.set_remote_description(sdp).await;
                let _ = session.send_result(wire::SUCCESS, id).await;
                session.fire_event(EVENT_SDP_SET, NO_ID, 1);
                true
            }
            Ok(Body::AddCandidates { sdp }) => {
                self.agent.add_remote_candidate(sdp).await;
                let _ = session.send_result(wire::SUCCESS, id).await;
                true
            }
            Ok(Body::GatheringDone) => {
                self.agent.set_remote_gathering_done().await;
                let _ = session.send_result(wire::SUCCESS, id).await;
                session.fire_event(EVENT_GATHERING_DONE, NO_ID, 1);
                true
            }
            Ok(Body::Passthrough { payload, .. }) => {
                session.hooks().on_p2p_packet_received(payload).await;
                true
            }
            // Any other recognized-but-out-of-place peer-linker type (or a
            // decode error) is treated as opaque application data once a
            // session has reached the ICE layer — never an error here.
            _ => {
                true
            }
        }
    }

    fn error_packet_type(&self) -> u16 {
        wire::ERROR
    }
}

struct IceSink<S: TransportSender> {
    ws: Arc<WebSocketSession<S>>,
}

#[async_trait]
impl<S: TransportSender> AgentSink for IceSink<S> {
    async fn on_local_candidate(&self, sdp: String) {
        let id = self.ws.next_request_id();
        let frame = wire::encode(id, &Body::AddCandidates { sdp });
        if let Err(err) = self.ws.send_raw(frame).await {
            tracing::warn!(error = %err, "ice: failed to send trickle candidate");
        }
    }

    async fn on_gathering_done(&self) {
        let id = self.ws.next_request_id();
        let frame = wire::encode(id, &Body::GatheringDone);
        if let Err(err) = self.ws.send_raw(frame).await {
            tracing::warn!(error = %err, "ice: failed to send GatheringDone");
        }
    }

    async fn on_state(&self, connected: bool) {
        if connected {
            self.ws.fire_event(EVENT_CONNECTED, NO_ID, 1);
        }
    }

    async fn on_recv(&self, payload: Bytes) {
        self.ws.hooks().on_p2p_packet_received(payload).await;
    }
}

/// STUN/TURN configuration handed to [`IceSession::start`].
#[derive(Debug, Clone)]
pub struct IceConfig {
    pub stun: String,
    pub turn: Vec<String>,
    pub bind_address: String,
}

/// Client-side ICE session: runs the peer-linker register/link sequence,
/// then drives SDP/candidate exchange until the direct UDP channel is up.
pub struct IceSession<S: TransportSender> {
    ws: Arc<WebSocketSession<S>>,
    agent: Arc<dyn IceAgent>,
}

impl<S: TransportSender> IceSession<S> {
    pub fn spawn<R: TransportReceiver>(
        sender: S,
        receiver: R,
        hooks: Arc<dyn SessionHooks>,
        agent: Arc<dyn IceAgent>,
    ) -> Self {
        let handler: Arc<dyn FrameHandler<S>> = Arc::new(IceHandler { agent: agent.clone() });
        let ws = WebSocketSession::spawn(sender, receiver, handler, hooks);
        IceSession { ws, agent }
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

    /// Runs the full startup sequence described in §4.5: peer-linker
    /// register/link, then ICE local-SDP publish, then await the peer's
    /// SDP, gathering-done, and finally the agent's connected state.
    pub async fn start(&self, params: StartParams, ice: IceConfig) -> bool {
        let peer_linker = PeerLinkerSession::from_ws(self.ws.clone());
        if !peer_linker.start(params).await {
            return false;
        }

        // Register interest in every milestone the handshake can fire
        // before sending anything that could trigger one: the event bus is
        // single-shot, so an event raised ahead of its waiter being
        // registered is dropped rather than queued, and a bare `.wait(...)`
        // doesn't register until its future is first polled.
        let events = self.ws.event_bus();
        let sdp_set = events.register(EVENT_SDP_SET, NO_ID);
        let gathering_done = events.register(EVENT_GATHERING_DONE, NO_ID);
        let connected = events.register(EVENT_CONNECTED, NO_ID);

        if !self.start_ice(ice).await {
            return false;
        }
        sdp_set.await == 1 && gathering_done.await == 1 && connected.await == 1
    }

    async fn start_ice(&self, ice: IceConfig) -> bool {
        let sink: Arc<dyn AgentSink> = Arc::new(IceSink { ws: self.ws.clone() });
        self.agent.init(&ice.stun, &ice.turn, &ice.bind_address, sink).await;
        let local_sdp = self.agent.local_description().await;
        let id = self.ws.next_request_id();
        let payload = wire::encode(id, &Body::SetCandidates { sdp: local_sdp });
        matches!(
            self.ws.call_and_wait(crate::ws_session::EVENT_RESULT, id, payload).await,
            Ok(1)
        )
    }

    /// Hands `payload` to the UDP agent. Fails if the agent has not yet
    /// reported a connected state.
    pub async fn send_packet_p2p(&self, payload: Bytes) -> bool {
        self.agent.send(payload).await
    }
}
