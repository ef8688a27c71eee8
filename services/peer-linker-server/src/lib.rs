//! Authoritative server for pad registration, the link/authentication
//! handshake, and passthrough routing (SPEC_FULL §4.6).

pub mod error;
pub mod handler;
pub mod state;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

pub use state::PeerLinkerState;

pub fn build_router(state: Arc<PeerLinkerState>) -> Router {
    Router::new()
        .route("/", get(handler::peer_linker_ws_handler))
        .with_state(state)
}
