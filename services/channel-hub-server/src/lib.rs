//! Authoritative server for named channels and pad-request brokerage
//! (SPEC_FULL §4.7).

pub mod error;
pub mod handler;
pub mod state;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

pub use state::ChannelHubState;

pub fn build_router(state: Arc<ChannelHubState>) -> Router {
    Router::new()
        .route("/", get(handler::channel_hub_ws_handler))
        .with_state(state)
}
