use async_trait::async_trait;
use bytes::Bytes;
use signal_client::SessionHooks;
use tracing::info;

/// Hooks for the demo CLI: admits any link request offering the
/// configured shared secret, and prints inbound passthrough data.
pub struct DemoHooks {
    secret: Vec<u8>,
}

impl DemoHooks {
    pub fn new(secret: Vec<u8>) -> Self {
        Self { secret }
    }
}

#[async_trait]
impl SessionHooks for DemoHooks {
    async fn auth_peer(&self, peer_name: &str, secret: &[u8]) -> bool {
        let ok = secret == self.secret.as_slice();
        info!(peer_name, ok, "link request");
        ok
    }

    fn get_auth_secret(&self) -> Vec<u8> {
        self.secret.clone()
    }

    async fn on_p2p_packet_received(&self, payload: Bytes) {
        println!("{}", String::from_utf8_lossy(&payload));
    }

    async fn on_disconnected(&self) {
        info!("session disconnected");
    }

    async fn on_pad_created(&self) {
        info!("pad registered");
    }
}
