//! A known peer and its connections (spec §3 "PeerInfo")

use std::sync::RwLock;

use peernet_core::address::PeerAddress;
use peernet_core::identity::{Features, NodeId};
use peernet_crypto::PublicKey;

use crate::connection::{Connection, ConnectionStatus};

/// A peer the local node knows about, directly or virtually (spec §3).
///
/// `connections_active`/`connections_inactive` are held behind their own
/// lock rather than the whole `PeerInfo`, matching spec §5's "state
/// mutations on `PeerInfo.connections*` are serialized by a per-peer lock" —
/// other fields (`features`, `is_virtual`) are set once at construction and
/// never mutated afterward, so they need no lock.
#[derive(Debug)]
pub struct PeerInfo {
    pub public_key: PublicKey,
    pub node_id: NodeId,
    pub features: Features,
    /// True when this peer was created from a Traverse-relayed Announcement
    /// rather than a direct authenticated message (spec §4.G Receive role).
    pub is_virtual: bool,
    connections_active: RwLock<Vec<Connection>>,
    connections_inactive: RwLock<Vec<Connection>>,
    /// Candidate addresses to try outbound sends against while this peer
    /// has no confirmed connection yet (spec §3 "targetAddresses", §9
    /// "Virtual peers"). Empty for a non-virtual peer.
    target_addresses: RwLock<Vec<PeerAddress>>,
}

impl PeerInfo {
    pub fn new(public_key: PublicKey, features: Features) -> Self {
        let node_id = public_key.node_id();
        Self {
            public_key,
            node_id,
            features,
            is_virtual: false,
            connections_active: RwLock::new(Vec::new()),
            connections_inactive: RwLock::new(Vec::new()),
            target_addresses: RwLock::new(Vec::new()),
        }
    }

    /// Construct a virtual peer born from a Traverse Receive (spec §4.G):
    /// no connection yet, only candidate addresses to attempt a hole-punch
    /// against (spec §9 "Virtual peers" — "outbound sends must route via
    /// candidate targetAddresses, attempting each until one replies").
    pub fn new_virtual(
        public_key: PublicKey,
        features: Features,
        target_addresses: Vec<PeerAddress>,
    ) -> Self {
        let mut peer = Self::new(public_key, features);
        peer.is_virtual = true;
        peer.target_addresses = RwLock::new(target_addresses);
        peer
    }

    pub fn target_addresses(&self) -> Vec<PeerAddress> {
        self.target_addresses.read().unwrap().clone()
    }

    /// The transition from virtual to real happens on first authenticated
    /// inbound packet (spec §9): once a real connection exists there is no
    /// further need to guess at candidate addresses.
    pub fn clear_target_addresses(&self) {
        self.target_addresses.write().unwrap().clear();
    }

    /// Attach a connection to the active set, deduplicating by address (a
    /// repeat announcement from the same address just refreshes liveness
    /// instead of growing the set unboundedly).
    pub fn attach_connection(&self, mut connection: Connection) {
        let mut active = self.connections_active.write().unwrap();
        if let Some(existing) = active.iter_mut().find(|c| c.address == connection.address) {
            existing.touch_received();
            return;
        }
        connection.touch_received();
        active.push(connection);
    }

    /// Record that a ping was just sent on the active connection at
    /// `address`, so the auto-ping loop's `due_for_ping_now` doesn't fire
    /// again next tick (spec §4.C, §5).
    pub fn touch_ping_sent(&self, address: &PeerAddress) {
        let mut active = self.connections_active.write().unwrap();
        if let Some(conn) = active.iter_mut().find(|c| c.address == *address) {
            conn.touch_ping_sent();
        }
    }

    pub fn get_connections(&self, active: bool) -> Vec<Connection> {
        if active {
            self.connections_active.read().unwrap().clone()
        } else {
            self.connections_inactive.read().unwrap().clone()
        }
    }

    pub fn active_count(&self) -> usize {
        self.connections_active.read().unwrap().len()
    }

    pub fn inactive_count(&self) -> usize {
        self.connections_inactive.read().unwrap().len()
    }

    /// Select a connection matching the classifier predicate, to advertise
    /// this peer to a third party (spec §4.C `GetConnection2Share`).
    pub fn connection_to_share(
        &self,
        allow_local: bool,
        allow_ipv4: bool,
        allow_ipv6: bool,
    ) -> Option<Connection> {
        self.connections_active
            .read()
            .unwrap()
            .iter()
            .find(|c| c.matches(allow_local, allow_ipv4, allow_ipv6))
            .cloned()
    }

    /// Whether any active connection matches the predicate (spec §4.C
    /// `IsConnectable`).
    pub fn is_connectable(&self, allow_local: bool, allow_ipv4: bool, allow_ipv6: bool) -> bool {
        self.connection_to_share(allow_local, allow_ipv4, allow_ipv6)
            .is_some()
    }

    /// Move every active connection past its invalidate threshold into the
    /// inactive set (spec §4.C auto-ping loop).
    pub fn invalidate_stale(&self, now: std::time::Instant) {
        let mut active = self.connections_active.write().unwrap();
        let mut inactive = self.connections_inactive.write().unwrap();
        let (stale, fresh): (Vec<_>, Vec<_>) =
            active.drain(..).partition(|c| c.is_stale_for_invalidate(now));
        *active = fresh;
        inactive.extend(stale);
    }

    /// Drop an inactive connection, used by the remove step of the
    /// auto-ping loop (spec §4.C).
    pub fn remove_inactive(&self, address: &peernet_core::address::PeerAddress) {
        self.connections_inactive
            .write()
            .unwrap()
            .retain(|c| &c.address != address);
    }

    pub fn has_no_connections(&self) -> bool {
        self.active_count() == 0 && self.inactive_count() == 0
    }
}


#[cfg(test)]
impl PeerInfo {
    /// Test-only: attach without touching `last_packet_in`, so staleness
    /// tests can backdate a connection before inserting it.
    pub(crate) fn attach_connection_for_test(&self, connection: Connection) {
        self.connections_active.write().unwrap().push(connection);
    }
}
