//! Information-request orchestrator (spec §4.F)
//!
//! A single `FindPeer`/`FindValue` Announcement is fanned out to several
//! contacts at once; each Response that names a matching `Hash2Peer` entry
//! is forwarded here until either every contact has answered (`Done`) or
//! the caller loses interest (`Terminate`). Both paths close the result
//! channel exactly once — mirrored from the Go source's `dht.InformationRequest`
//! counting down outstanding responses and closing its result channel when
//! it reaches zero.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc;

use peernet_codec::peer_record::PeerRecord;
use peernet_core::identity::NodeId;

/// One peer's contribution to an information request: the closest contacts
/// and/or storing peers it returned, and any directly embedded data.
#[derive(Debug, Clone)]
pub struct NodeMessage {
    pub sender_id: NodeId,
    pub closest: Vec<PeerRecord>,
    pub storing: Vec<PeerRecord>,
    pub data: Option<Vec<u8>>,
}

/// Orchestrates one outstanding FindPeer/FindValue request across multiple
/// contacts (spec §4.F).
pub struct InformationRequest {
    outstanding: AtomicUsize,
    terminated: AtomicBool,
    sender: Mutex<Option<mpsc::UnboundedSender<NodeMessage>>>,
}

impl InformationRequest {
    /// Create a request expecting up to `contact_count` responses, and the
    /// receiving half of its result channel.
    pub fn new(contact_count: usize) -> (Self, mpsc::UnboundedReceiver<NodeMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                outstanding: AtomicUsize::new(contact_count),
                terminated: AtomicBool::new(false),
                sender: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    /// Forward one contact's response. Returns `false` once the request is
    /// already terminated, so the caller knows not to count on delivery.
    pub fn forward(&self, message: NodeMessage) -> bool {
        if self.is_terminated() {
            return false;
        }
        let sent = {
            let guard = self.sender.lock().unwrap();
            match guard.as_ref() {
                Some(tx) => tx.send(message).is_ok(),
                None => false,
            }
        };
        self.done();
        sent
    }

    /// Count one contact as answered (or unreachable); closes the result
    /// channel once every contact has been accounted for.
    pub fn done(&self) {
        let remaining = self.outstanding.fetch_sub(1, Ordering::SeqCst);
        if remaining == 1 {
            self.close();
        }
    }

    /// The caller no longer wants results; close the channel immediately
    /// regardless of how many contacts are still outstanding.
    pub fn terminate(&self) {
        self.close();
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    fn close(&self) {
        if self
            .terminated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.sender.lock().unwrap().take();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(byte: u8) -> NodeId {
        NodeId::from_bytes([byte; 32])
    }

    #[tokio::test]
    async fn done_closes_after_last_outstanding_response() {
        let (request, mut rx) = InformationRequest::new(2);

        assert!(request.forward(NodeMessage {
            sender_id: node(1),
            closest: vec![],
            storing: vec![],
            data: None,
        }));
        assert!(!request.is_terminated());

        assert!(request.forward(NodeMessage {
            sender_id: node(2),
            closest: vec![],
            storing: vec![],
            data: None,
        }));
        assert!(request.is_terminated());

        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn terminate_closes_channel_early() {
        let (request, mut rx) = InformationRequest::new(5);
        request.terminate();
        assert!(request.is_terminated());
        assert!(!request.forward(NodeMessage {
            sender_id: node(9),
            closest: vec![],
            storing: vec![],
            data: None,
        }));
        assert!(rx.recv().await.is_none());
    }
}
