//! Disconnect-cascade and precondition-rejection scenarios (SPEC_FULL §8,
//! scenarios 3-4) against a real socket.

use std::sync::Arc;

use bytes::Bytes;
use signal_protocol::peer_linker::{self as wire, Body};
use signal_test_support::WsHarness;

async fn spawn_server() -> String {
    let state = Arc::new(peer_linker_server::PeerLinkerState::new());
    let router = peer_linker_server::build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("ws://{addr}/")
}

async fn request(client: &mut WsHarness, id: u32, body: &Body) -> Body {
    client.send_frame(wire::encode(id, body)).await.unwrap();
    wire::decode(client.recv_frame().await.unwrap()).unwrap().1
}

#[tokio::test]
async fn double_register_on_the_same_session_is_rejected() {
    let url = spawn_server().await;
    let mut a = WsHarness::connect(&url, "peer-linker").await.unwrap();

    let reply = request(&mut a, 1, &Body::Register { pad_name: "x".to_owned() }).await;
    assert_eq!(reply, Body::Success);

    let reply = request(&mut a, 2, &Body::Register { pad_name: "x".to_owned() }).await;
    assert_eq!(reply, Body::Error);
}

#[tokio::test]
async fn disconnect_cascade_notifies_linked_peer_exactly_once() {
    let url = spawn_server().await;
    let mut a = WsHarness::connect(&url, "peer-linker").await.unwrap();
    let mut b = WsHarness::connect(&url, "peer-linker").await.unwrap();

    request(&mut a, 1, &Body::Register { pad_name: "agent a".to_owned() }).await;
    request(&mut b, 1, &Body::Register { pad_name: "agent b".to_owned() }).await;
    request(
        &mut a,
        2,
        &Body::Link { requestee_name: "agent b".to_owned(), secret: Bytes::new().to_vec() },
    )
    .await;
    let _link_auth = b.recv_frame().await.unwrap();
    let reply = request(
        &mut b,
        3,
        &Body::LinkAuthResponse { ok: true, requester_name: "agent a".to_owned() },
    )
    .await;
    assert_eq!(reply, Body::Success);
    let link_success = a.recv_frame().await.unwrap();
    assert_eq!(wire::decode(link_success).unwrap().1, Body::LinkSuccess);

    a.close().await.unwrap();

    let unlinked = b.recv_frame().await.unwrap();
    assert_eq!(wire::decode(unlinked).unwrap().1, Body::Unlinked);
}

#[tokio::test]
async fn empty_pad_name_is_rejected() {
    let url = spawn_server().await;
    let mut a = WsHarness::connect(&url, "peer-linker").await.unwrap();
    let reply = request(&mut a, 1, &Body::Register { pad_name: String::new() }).await;
    assert_eq!(reply, Body::Error);
}

#[tokio::test]
async fn too_short_frame_is_rejected_with_error_and_session_stays_open() {
    let url = spawn_server().await;
    let mut a = WsHarness::connect(&url, "peer-linker").await.unwrap();

    a.send_frame(Bytes::from_static(&[1, 2, 3])).await.unwrap();
    let reply = a.recv_frame().await.unwrap();
    let (id, body) = wire::decode(reply).unwrap();
    assert_eq!(id, 0);
    assert_eq!(body, Body::Error);

    // The session is still usable afterwards.
    let reply = request(&mut a, 1, &Body::Register { pad_name: "agent a".to_owned() }).await;
    assert_eq!(reply, Body::Success);
}

#[tokio::test]
async fn link_to_unknown_peer_is_rejected() {
    let url = spawn_server().await;
    let mut a = WsHarness::connect(&url, "peer-linker").await.unwrap();
    request(&mut a, 1, &Body::Register { pad_name: "agent a".to_owned() }).await;
    let reply = request(
        &mut a,
        2,
        &Body::Link { requestee_name: "nobody".to_owned(), secret: vec![] },
    )
    .await;
    assert_eq!(reply, Body::Error);
}
