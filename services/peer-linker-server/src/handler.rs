//! The axum WebSocket upgrade handler: one task per connected session,
//! grounded on the teacher's `ws_forwarder::handle_forwarder_socket`
//! `tokio::select!` shape (inbound frame / outbound channel), but without
//! any persistence — this server's entire state lives in
//! [`crate::state::PeerLinkerState`].

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use bytes::{Buf, Bytes};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::PeerLinkerState;

pub async fn peer_linker_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<PeerLinkerState>>,
) -> impl IntoResponse {
    ws.protocols(["peer-linker"])
        .on_upgrade(move |socket| handle_session(socket, state))
}

async fn handle_session(mut socket: WebSocket, state: Arc<PeerLinkerState>) {
    let session_id = Uuid::new_v4();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Bytes>();
    state.register_session(session_id, outbound_tx);
    info!(%session_id, "peer-linker session connected");

    loop {
        tokio::select! {
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Binary(frame))) => {
                        let mut frame: Bytes = frame;
                        if frame.len() < signal_protocol::HEADER_LEN {
                            warn!(%session_id, "frame shorter than header, rejecting");
                            let reply = signal_protocol::peer_linker::encode(0, &signal_protocol::peer_linker::Body::Error);
                            if socket.send(Message::Binary(reply)).await.is_err() {
                                break;
                            }
                            continue;
                        }
                        let kind = frame.get_u16_le();
                        let id = frame.get_u32_le();
                        if let Some(reply) = state.handle_packet(session_id, id, kind, frame) {
                            if socket.send(Message::Binary(reply)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                    Some(Ok(Message::Text(_))) => {
                        warn!(%session_id, "text frame on a binary-only protocol, ignoring");
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        warn!(%session_id, %err, "websocket error");
                        break;
                    }
                }
            }
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(frame) => {
                        if socket.send(Message::Binary(frame)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    state.remove_session(session_id);
    info!(%session_id, "peer-linker session disconnected");
}
