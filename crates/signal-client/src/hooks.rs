use async_trait::async_trait;
use bytes::Bytes;

/// Application-defined behavior plugged into a session at construction time.
///
/// This is the capability record mentioned in the design notes: rather than
/// a subclass overriding virtual methods, the session holds an
/// `Arc<dyn SessionHooks>` and calls into it at the points a subclass would
/// otherwise have overridden. Every method has a default so a caller only
/// needs to implement the hooks it cares about.
#[async_trait]
pub trait SessionHooks: Send + Sync {
    /// Decide whether to accept a link request from `peer_name` offering
    /// `secret`. The default denies everything.
    async fn auth_peer(&self, _peer_name: &str, _secret: &[u8]) -> bool {
        false
    }

    /// The secret this pad offers when it initiates a `Link`.
    fn get_auth_secret(&self) -> Vec<u8> {
        Vec::new()
    }

    /// Inbound application data: either server passthrough (bare
    /// `PeerLinkerSession`) or direct-channel bytes (`IceSession`).
    async fn on_p2p_packet_received(&self, _payload: Bytes) {}

    /// Fired once, when the session transitions to disconnected.
    async fn on_disconnected(&self) {}

    /// Fired once `Register` succeeds.
    async fn on_pad_created(&self) {}
}

/// A hooks implementation that accepts the defaults for everything.
pub struct NoopHooks;

#[async_trait]
impl SessionHooks for NoopHooks {}
