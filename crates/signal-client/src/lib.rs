//! Client-side session layers for the peer-linker / ICE signaling protocol.
//!
//! [`ws_session::WebSocketSession`] owns a transport connection and exposes
//! the request/reply primitive every higher layer is built on.
//! [`peer_linker::PeerLinkerSession`] adds pad register/link/auth semantics.
//! [`ice::IceSession`] adds SDP/candidate exchange on top of that, handing
//! off to a UDP agent once both sides are connected.

pub mod error;
pub mod hooks;
pub mod ice;
pub mod peer_linker;
pub mod transport;
pub mod ws_session;

pub use error::{SessionError, TransportError};
pub use hooks::{NoopHooks, SessionHooks};
pub use ice::{AgentSink, IceAgent, IceConfig, IceSession};
pub use peer_linker::{PeerLinkerSession, StartParams};
pub use transport::{TransportReceiver, TransportSender};
pub use ws_session::WebSocketSession;
