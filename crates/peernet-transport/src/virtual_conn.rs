//! Virtual packet connection (spec §4.I)
//!
//! Wraps one bidirectional sequence as a logical duplex byte channel: bytes
//! handed to [`VirtualPacketConn::send_outgoing`] are wrapped by the caller
//! as `GetBlock` `Active` packets and sent over the real socket; bytes that
//! arrive on the same sequence are pushed in via
//! [`VirtualPacketConn::deliver_incoming`]. Grounded on
//! `newVirtualPacketConn` in `examples/original_source/Transfer Block.go` —
//! the dispatch callback there (`func(data []byte, sequenceNumber uint32)`)
//! is this crate's `dispatch` closure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, Mutex, Notify};

/// One bidirectional virtual channel, backed by a registered sequence
/// number. `peernet-node` owns the real socket: it calls
/// [`deliver_incoming`](Self::deliver_incoming) when a matching packet
/// arrives, and sends whatever `dispatch` is called with.
pub struct VirtualPacketConn {
    pub sequence_number: u32,
    dispatch: Box<dyn Fn(Bytes) + Send + Sync>,
    incoming_tx: mpsc::UnboundedSender<Bytes>,
    incoming_rx: Mutex<mpsc::UnboundedReceiver<Bytes>>,
    terminated: Arc<AtomicBool>,
    termination_signal: Arc<Notify>,
}

impl VirtualPacketConn {
    pub fn new(sequence_number: u32, dispatch: impl Fn(Bytes) + Send + Sync + 'static) -> Self {
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        Self {
            sequence_number,
            dispatch: Box::new(dispatch),
            incoming_tx,
            incoming_rx: Mutex::new(incoming_rx),
            terminated: Arc::new(AtomicBool::new(false)),
            termination_signal: Arc::new(Notify::new()),
        }
    }

    /// Feed one inbound packet's raw payload that arrived tagged with this
    /// channel's sequence number.
    pub fn deliver_incoming(&self, data: Bytes) {
        let _ = self.incoming_tx.send(data);
    }

    /// Await the next inbound payload. `None` once the channel has been
    /// terminated, even if a reader is already blocked waiting (spec §5:
    /// "outstanding reads return an error" once the termination signal
    /// fires) — races the channel recv against
    /// [`wait_terminated`](Self::wait_terminated) rather than relying on
    /// `incoming_tx` ever being dropped, since the conn holds its own sender.
    pub async fn recv_incoming(&self) -> Option<Bytes> {
        tokio::select! {
            biased;
            _ = self.wait_terminated() => None,
            received = async { self.incoming_rx.lock().await.recv().await } => received,
        }
    }

    /// Hand a payload to the dispatch closure to be sent over the wire as a
    /// `GetBlock` `Active` packet carrying this channel's sequence number.
    pub fn send_outgoing(&self, data: Bytes) {
        (self.dispatch)(data);
    }

    /// Close the channel, per spec's `terminationSignal` — any waiter on
    /// [`wait_terminated`](Self::wait_terminated) is released.
    pub fn terminate(&self) {
        self.terminated.store(true, Ordering::SeqCst);
        self.termination_signal.notify_waiters();
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    pub async fn wait_terminated(&self) {
        if self.is_terminated() {
            return;
        }
        self.termination_signal.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[tokio::test]
    async fn deliver_then_recv_roundtrips() {
        let conn = VirtualPacketConn::new(1, |_| {});
        conn.deliver_incoming(Bytes::from_static(b"hello"));
        let received = conn.recv_incoming().await.unwrap();
        assert_eq!(received, Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn send_outgoing_invokes_dispatch() {
        let sent: Arc<StdMutex<Vec<Bytes>>> = Arc::new(StdMutex::new(Vec::new()));
        let sent_clone = sent.clone();
        let conn = VirtualPacketConn::new(1, move |data| sent_clone.lock().unwrap().push(data));

        conn.send_outgoing(Bytes::from_static(b"out"));
        assert_eq!(sent.lock().unwrap().as_slice(), &[Bytes::from_static(b"out")]);
    }

    #[tokio::test]
    async fn terminate_releases_waiter() {
        let conn = Arc::new(VirtualPacketConn::new(1, |_| {}));
        let waiter = conn.clone();
        let handle = tokio::spawn(async move {
            waiter.wait_terminated().await;
        });
        conn.terminate();
        handle.await.unwrap();
        assert!(conn.is_terminated());
    }

    #[tokio::test]
    async fn terminate_unblocks_pending_recv() {
        let conn = Arc::new(VirtualPacketConn::new(1, |_| {}));
        let reader = conn.clone();
        let handle = tokio::spawn(async move { reader.recv_incoming().await });

        tokio::task::yield_now().await;
        conn.terminate();

        let received = handle.await.unwrap();
        assert!(received.is_none());
    }

    #[tokio::test]
    async fn recv_incoming_returns_none_immediately_if_already_terminated() {
        let conn = VirtualPacketConn::new(1, |_| {});
        conn.terminate();
        assert!(conn.recv_incoming().await.is_none());
    }
}
