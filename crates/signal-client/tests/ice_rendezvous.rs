//! End-to-end ICE rendezvous (SPEC_FULL §8, scenario 5): two `IceSession`s
//! register and mutually link through a real `peer_linker_server::PeerLinkerState`
//! (driven over the in-memory duplex transport rather than a socket — the
//! server logic under test is identical to what the axum handler drives),
//! then exchange SDP/candidates/gathering-done until both report connected
//! and can exchange data over the simulated direct channel.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use peer_linker_server::PeerLinkerState;
use signal_client::{IceConfig, IceSession, SessionHooks, StartParams};
use signal_protocol::extract_header;
use signal_test_support::{Endpoint, PairedIceAgent};
use tokio::sync::{mpsc, Barrier};
use uuid::Uuid;

/// Drives one server-side connection end against `state`, the same shape as
/// `peer_linker_server::handler::handle_session` driving a real socket.
fn spawn_broker_session(state: Arc<PeerLinkerState>, mut endpoint: Endpoint) {
    let session_id = Uuid::new_v4();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Bytes>();
    state.register_session(session_id, outbound_tx);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                inbound = endpoint.receiver.recv() => {
                    let Ok(Some(frame)) = inbound else { break };
                    let Ok((header, payload)) = extract_header(frame) else { continue };
                    if let Some(reply) = state.handle_packet(session_id, header.id, header.kind, payload) {
                        if endpoint.sender.send(reply).await.is_err() {
                            break;
                        }
                    }
                }
                outbound = outbound_rx.recv() => {
                    let Some(frame) = outbound else { break };
                    if endpoint.sender.send(frame).await.is_err() {
                        break;
                    }
                }
            }
        }
        state.remove_session(session_id);
    });
}

/// Admits any peer offering the configured secret. `on_pad_created` blocks
/// at a two-party barrier so both pads are registered on the server before
/// either side attempts to link to the other by name — without this, the
/// first side to finish its register round trip could try to link to a
/// peer name the server hasn't seen yet.
struct SyncedHooks {
    secret: Vec<u8>,
    registered: Arc<Barrier>,
}

#[async_trait]
impl SessionHooks for SyncedHooks {
    async fn auth_peer(&self, _peer_name: &str, secret: &[u8]) -> bool {
        secret == self.secret.as_slice()
    }
    fn get_auth_secret(&self) -> Vec<u8> {
        self.secret.clone()
    }
    async fn on_pad_created(&self) {
        self.registered.wait().await;
    }
}

#[tokio::test]
async fn both_sides_reach_connected_and_exchange_p2p_data() {
    let state = Arc::new(PeerLinkerState::new());

    let (client_a, server_a) = signal_test_support::duplex_transport::pair();
    let (client_b, server_b) = signal_test_support::duplex_transport::pair();
    spawn_broker_session(state.clone(), server_a);
    spawn_broker_session(state.clone(), server_b);

    let (agent_a, agent_b) = PairedIceAgent::paired("sdp-a", "sdp-b");
    let secret = b"shared-secret".to_vec();
    let registered = Arc::new(Barrier::new(2));

    let session_a = Arc::new(IceSession::spawn(
        client_a.sender,
        client_a.receiver,
        Arc::new(SyncedHooks { secret: secret.clone(), registered: registered.clone() }),
        agent_a,
    ));
    let session_b = Arc::new(IceSession::spawn(
        client_b.sender,
        client_b.receiver,
        Arc::new(SyncedHooks { secret, registered }),
        agent_b,
    ));

    let ice_a = IceConfig { stun: "stun:example".to_owned(), turn: vec![], bind_address: "0.0.0.0:0".to_owned() };
    let ice_b = ice_a.clone();

    let task_a = {
        let session_a = session_a.clone();
        tokio::spawn(async move {
            session_a
                .start(
                    StartParams { pad_name: "agent a".to_owned(), target_pad_name: Some("agent b".to_owned()) },
                    ice_a,
                )
                .await
        })
    };
    let task_b = {
        let session_b = session_b.clone();
        tokio::spawn(async move {
            session_b
                .start(
                    StartParams { pad_name: "agent b".to_owned(), target_pad_name: Some("agent a".to_owned()) },
                    ice_b,
                )
                .await
        })
    };

    let (ok_a, ok_b) = tokio::join!(task_a, task_b);
    assert!(ok_a.unwrap(), "A's ICE rendezvous should succeed");
    assert!(ok_b.unwrap(), "B's ICE rendezvous should succeed");

    assert!(session_a.send_packet_p2p(Bytes::from_static(b"hello")).await);
    assert!(session_b.send_packet_p2p(Bytes::from_static(b"hi back")).await);
}
