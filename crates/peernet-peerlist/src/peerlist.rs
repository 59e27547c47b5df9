//! Process-wide peer arena (spec §4.C)

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, instrument};

use peernet_core::identity::{Features, NodeId};
use peernet_crypto::PublicKey;

use crate::connection::Connection;
use crate::peer_info::PeerInfo;

/// Process-wide table of known peers, indexed by NodeID (derived from each
/// peer's public key). `DashMap` gives the same lock-free-read arena shape
/// the teacher uses for its connection table.
#[derive(Default)]
pub struct Peerlist {
    peers: DashMap<NodeId, Arc<PeerInfo>>,
}

impl Peerlist {
    pub fn new() -> Self {
        Self {
            peers: DashMap::new(),
        }
    }

    /// Upsert a peer and attach a connection to it (spec §4.C
    /// `PeerlistAdd`). Returns the peer and whether it was newly created.
    #[instrument(skip(self, connection, features))]
    pub fn add(
        &self,
        public_key: PublicKey,
        features: Features,
        connection: Connection,
    ) -> (Arc<PeerInfo>, bool) {
        let node_id = public_key.node_id();
        let mut was_new = false;

        let peer = self
            .peers
            .entry(node_id)
            .or_insert_with(|| {
                was_new = true;
                debug!(%node_id, "new peer");
                Arc::new(PeerInfo::new(public_key, features))
            })
            .clone();

        peer.attach_connection(connection);
        (peer, was_new)
    }

    /// Insert a virtual peer created from a Traverse Receive (spec §4.G);
    /// does nothing if a peer with this key is already known.
    pub fn add_virtual(
        &self,
        public_key: PublicKey,
        features: Features,
        target_addresses: Vec<peernet_core::address::PeerAddress>,
    ) -> Arc<PeerInfo> {
        let node_id = public_key.node_id();
        self.peers
            .entry(node_id)
            .or_insert_with(|| Arc::new(PeerInfo::new_virtual(public_key, features, target_addresses)))
            .clone()
    }

    pub fn lookup(&self, public_key: &PublicKey) -> Option<Arc<PeerInfo>> {
        self.peers.get(&public_key.node_id()).map(|e| e.clone())
    }

    pub fn lookup_by_node_id(&self, node_id: &NodeId) -> Option<Arc<PeerInfo>> {
        self.peers.get(node_id).map(|e| e.clone())
    }

    /// Snapshot of every known peer (spec §4.C `PeerlistGet`).
    pub fn snapshot(&self) -> Vec<Arc<PeerInfo>> {
        self.peers.iter().map(|e| e.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Remove a peer once all its connections are gone past the remove
    /// threshold and nothing else references it (spec §3 PeerInfo
    /// lifecycle — the "no active sequence references it" half of that
    /// condition is enforced by the caller in `peernet-routing`, which
    /// knows about sequences; this crate only knows about connections).
    pub fn remove_if_empty(&self, node_id: &NodeId) -> bool {
        let Some(entry) = self.peers.get(node_id) else {
            return false;
        };
        let empty = entry.has_no_connections();
        drop(entry);
        if empty {
            self.peers.remove(node_id);
        }
        empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionStatus;
    use peernet_core::address::PeerAddress;
    use peernet_crypto::Keypair;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr() -> PeerAddress {
        PeerAddress::new(IpAddr::V4(Ipv4Addr::new(198, 51, 100, 7)), 3000)
    }

    #[test]
    fn add_reports_new_then_existing() {
        let list = Peerlist::new();
        let key = Keypair::generate().public();

        let (_, was_new) = list.add(
            key,
            Features::empty(),
            Connection::new(addr(), ConnectionStatus::Active),
        );
        assert!(was_new);

        let (_, was_new_again) = list.add(
            key,
            Features::empty(),
            Connection::new(addr(), ConnectionStatus::Active),
        );
        assert!(!was_new_again);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn lookup_finds_added_peer() {
        let list = Peerlist::new();
        let key = Keypair::generate().public();
        list.add(
            key,
            Features::empty(),
            Connection::new(addr(), ConnectionStatus::Active),
        );
        assert!(list.lookup(&key).is_some());
    }

    #[test]
    fn remove_if_empty_only_removes_truly_empty_peers() {
        let list = Peerlist::new();
        let key = Keypair::generate().public();
        let (peer, _) = list.add(
            key,
            Features::empty(),
            Connection::new(addr(), ConnectionStatus::Active),
        );
        assert!(!list.remove_if_empty(&peer.node_id));

        peer.invalidate_stale(std::time::Instant::now() + crate::connection::REMOVE_THRESHOLD);
        peer.remove_inactive(&addr());
        assert!(list.remove_if_empty(&peer.node_id));
        assert_eq!(list.len(), 0);
    }
}
