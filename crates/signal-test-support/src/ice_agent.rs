//! A deterministic in-memory [`IceAgent`] test double that loops two
//! instances together, standing in for the out-of-scope UDP/STUN/TURN agent
//! described in §6 of the design. The real SDP/candidate exchange still
//! happens over the signaling protocol (driven by whatever broker relays
//! frames between the two sessions under test); this double only needs to
//! simulate the "direct channel is up" transition and data delivery.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use signal_client::{AgentSink, IceAgent};
use tokio::sync::mpsc;

#[derive(Default)]
struct NegotiationState {
    remote_sdp_set: bool,
    remote_gathering_done: bool,
}

pub struct PairedIceAgent {
    local_sdp: String,
    sink: Mutex<Option<Arc<dyn AgentSink>>>,
    negotiation: Mutex<NegotiationState>,
    connected: AtomicBool,
    peer_data_tx: mpsc::UnboundedSender<Bytes>,
}

impl PairedIceAgent {
    /// Builds two agents whose `send`/`on_recv` form a direct channel. Each
    /// reports `Connected` once both a remote SDP and a remote
    /// gathering-done have been fed into it by the signaling layer —
    /// standing in for a real agent's connectivity checks completing.
    pub fn paired(local_sdp_a: &str, local_sdp_b: &str) -> (Arc<Self>, Arc<Self>) {
        let (a_tx, mut a_rx) = mpsc::unbounded_channel::<Bytes>();
        let (b_tx, mut b_rx) = mpsc::unbounded_channel::<Bytes>();

        let agent_a = Arc::new(PairedIceAgent {
            local_sdp: local_sdp_a.to_owned(),
            sink: Mutex::new(None),
            negotiation: Mutex::new(NegotiationState::default()),
            connected: AtomicBool::new(false),
            peer_data_tx: b_tx,
        });
        let agent_b = Arc::new(PairedIceAgent {
            local_sdp: local_sdp_b.to_owned(),
            sink: Mutex::new(None),
            negotiation: Mutex::new(NegotiationState::default()),
            connected: AtomicBool::new(false),
            peer_data_tx: a_tx,
        });

        let deliver_to_a = agent_a.clone();
        tokio::spawn(async move {
            while let Some(bytes) = a_rx.recv().await {
                if let Some(sink) = deliver_to_a.sink.lock().unwrap().clone() {
                    sink.on_recv(bytes).await;
                }
            }
        });
        let deliver_to_b = agent_b.clone();
        tokio::spawn(async move {
            while let Some(bytes) = b_rx.recv().await {
                if let Some(sink) = deliver_to_b.sink.lock().unwrap().clone() {
                    sink.on_recv(bytes).await;
                }
            }
        });

        (agent_a, agent_b)
    }

    async fn maybe_report_connected(&self) {
        let ready = {
            let state = self.negotiation.lock().unwrap();
            state.remote_sdp_set && state.remote_gathering_done
        };
        if ready && !self.connected.swap(true, Ordering::SeqCst) {
            if let Some(sink) = self.sink.lock().unwrap().clone() {
                sink.on_state(true).await;
            }
        }
    }
}

#[async_trait]
impl IceAgent for PairedIceAgent {
    async fn init(&self, _stun: &str, _turn: &[String], _bind_address: &str, sink: Arc<dyn AgentSink>) {
        *self.sink.lock().unwrap() = Some(sink.clone());
        // Gathering is instantaneous for the test double: one candidate,
        // then done.
        sink.on_local_candidate(self.local_sdp.clone()).await;
        sink.on_gathering_done().await;
    }

    async fn local_description(&self) -> String {
        self.local_sdp.clone()
    }

    async fn set_remote_description(&self, _sdp: String) {
        self.negotiation.lock().unwrap().remote_sdp_set = true;
        self.maybe_report_connected().await;
    }

    async fn add_remote_candidate(&self, _sdp: String) {}

    async fn set_remote_gathering_done(&self) {
        self.negotiation.lock().unwrap().remote_gathering_done = true;
        self.maybe_report_connected().await;
    }

    async fn send(&self, payload: Bytes) -> bool {
        if !self.connected.load(Ordering::SeqCst) {
            return false;
        }
        self.peer_data_tx.send(payload).is_ok()
    }
}
