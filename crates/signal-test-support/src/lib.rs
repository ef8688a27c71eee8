//! Shared test utilities for the signaling engine: an in-memory duplex
//! transport for unit-testing the client session layers, a paired ICE
//! agent double, and a real-socket harness for integration-testing the
//! server binaries — the signaling-protocol analogue of `rt-test-utils`.

pub mod duplex_transport;
pub mod ice_agent;
pub mod ws_harness;

pub use duplex_transport::{pair, Endpoint};
pub use ice_agent::PairedIceAgent;
pub use ws_harness::WsHarness;
