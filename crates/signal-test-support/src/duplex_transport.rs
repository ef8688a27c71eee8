//! An in-memory duplex [`TransportSender`]/[`TransportReceiver`] pair, used
//! to unit-test the client session layers without a real socket — the
//! analogue of `rt-test-utils`'s `MockWsServer`, but wired directly to a
//! channel instead of a TCP listener since the protocol under test doesn't
//! care which transport carries its frames.

use async_trait::async_trait;
use bytes::Bytes;
use signal_client::{TransportError, TransportReceiver, TransportSender};
use tokio::sync::mpsc;

pub struct DuplexSender {
    tx: mpsc::UnboundedSender<Bytes>,
}

pub struct DuplexReceiver {
    rx: mpsc::UnboundedReceiver<Bytes>,
}

#[async_trait]
impl TransportSender for DuplexSender {
    async fn send(&mut self, payload: Bytes) -> Result<(), TransportError> {
        self.tx.send(payload).map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        // Dropping the sender half is how an unbounded channel signals EOF
        // to the other side; there is no separate close frame to send.
        Ok(())
    }
}

#[async_trait]
impl TransportReceiver for DuplexReceiver {
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError> {
        Ok(self.rx.recv().await)
    }
}

pub struct Endpoint {
    pub sender: DuplexSender,
    pub receiver: DuplexReceiver,
}

/// Creates two cross-connected endpoints: whatever `a.sender` sends arrives
/// on `b.receiver`, and vice versa. Conventionally the first is "the
/// client" and the second "the server" in tests, but the pair is symmetric.
pub fn pair() -> (Endpoint, Endpoint) {
    let (a_to_b_tx, a_to_b_rx) = mpsc::unbounded_channel();
    let (b_to_a_tx, b_to_a_rx) = mpsc::unbounded_channel();
    let a = Endpoint { sender: DuplexSender { tx: a_to_b_tx }, receiver: DuplexReceiver { rx: b_to_a_rx } };
    let b = Endpoint { sender: DuplexSender { tx: b_to_a_tx }, receiver: DuplexReceiver { rx: a_to_b_rx } };
    (a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pair_delivers_frames_in_both_directions() {
        let (mut a, mut b) = pair();
        a.sender.send(Bytes::from_static(b"ping")).await.unwrap();
        assert_eq!(b.receiver.recv().await.unwrap(), Some(Bytes::from_static(b"ping")));

        b.sender.send(Bytes::from_static(b"pong")).await.unwrap();
        assert_eq!(a.receiver.recv().await.unwrap(), Some(Bytes::from_static(b"pong")));
    }

    #[tokio::test]
    async fn dropping_a_sender_ends_the_peers_receive_loop() {
        let (a, mut b) = pair();
        drop(a);
        assert_eq!(b.receiver.recv().await.unwrap(), None);
    }
}
