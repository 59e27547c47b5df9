//! Kademlia routing table (spec §3 "DHTNode", §4.D)

use std::sync::RwLock;

use peernet_core::identity::{NodeId, NODE_ID_LEN};
use tracing::debug;

use crate::bucket::{Bucket, BUCKET_SIZE};

const NUM_BUCKETS: usize = NODE_ID_LEN * 8;

/// What happened to an `insert` call.
#[derive(Debug)]
pub enum InsertOutcome<T> {
    /// The node was new and the bucket had room.
    Inserted,
    /// The node was already present; its liveness timestamp was refreshed.
    Updated,
    /// The bucket is full. `eviction_candidate` is the least-recently-seen
    /// member; the caller should probe it and call [`RoutingTable::replace`]
    /// if the probe fails, or [`RoutingTable::mark_alive`] if it succeeds
    /// (spec §4.D).
    BucketFull {
        eviction_candidate: NodeId,
        pending_id: NodeId,
        pending_info: T,
    },
}

/// Kademlia k-bucket routing table keyed by XOR distance to `local_id`.
/// Buckets are indexed by shared-prefix length with the local ID, same as
/// the classic Kademlia layout (spec §3: "Resides in Kademlia buckets
/// indexed by shared-prefix length against the local NodeID").
pub struct RoutingTable<T> {
    local_id: NodeId,
    buckets: Vec<RwLock<Bucket<T>>>,
}

impl<T: Clone> RoutingTable<T> {
    pub fn new(local_id: NodeId) -> Self {
        let mut buckets = Vec::with_capacity(NUM_BUCKETS);
        for _ in 0..NUM_BUCKETS {
            buckets.push(RwLock::new(Bucket::new()));
        }
        Self { local_id, buckets }
    }

    pub fn local_id(&self) -> NodeId {
        self.local_id
    }

    fn bucket_index(&self, id: &NodeId) -> Option<usize> {
        let shared = self.local_id.shared_prefix_len(id);
        if shared >= NUM_BUCKETS {
            return None; // id == local_id
        }
        Some(NUM_BUCKETS - 1 - shared)
    }

    /// Insert on any successful authenticated receive from a peer
    /// (spec §4.D).
    pub fn insert(&self, id: NodeId, info: T) -> InsertOutcome<T> {
        let Some(index) = self.bucket_index(&id) else {
            return InsertOutcome::Updated; // self, nothing to do
        };
        let mut bucket = self.buckets[index].write().unwrap();

        if bucket.touch(&id) {
            return InsertOutcome::Updated;
        }

        if !bucket.is_full() {
            bucket.push_back(id, info);
            return InsertOutcome::Inserted;
        }

        let candidate = bucket
            .least_recently_seen()
            .copied()
            .expect("full bucket has an entry");
        InsertOutcome::BucketFull {
            eviction_candidate: candidate,
            pending_id: id,
            pending_info: info,
        }
    }

    /// The probe to `eviction_candidate` succeeded: keep it, refresh its
    /// liveness, and drop the pending replacement.
    pub fn mark_alive(&self, id: &NodeId) {
        if let Some(index) = self.bucket_index(id) {
            self.buckets[index].write().unwrap().touch(id);
        }
    }

    /// The probe to `evict_id` failed: remove it and insert the pending
    /// replacement in its place.
    pub fn replace(&self, evict_id: &NodeId, new_id: NodeId, new_info: T) {
        let Some(index) = self.bucket_index(evict_id) else {
            return;
        };
        let mut bucket = self.buckets[index].write().unwrap();
        bucket.remove(evict_id);
        if !bucket.is_full() {
            bucket.push_back(new_id, new_info);
        }
        debug!(?evict_id, "evicted unresponsive bucket entry");
    }

    pub fn remove(&self, id: &NodeId) {
        if let Some(index) = self.bucket_index(id) {
            self.buckets[index].write().unwrap().remove(id);
        }
    }

    pub fn get(&self, id: &NodeId) -> Option<T> {
        let index = self.bucket_index(id)?;
        self.buckets[index].read().unwrap().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(|b| b.read().unwrap().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `GetClosestContacts(n, targetID, filter, excludeIDs…)` (spec §4.D):
    /// up to `n` nodes accepted by `filter`, sorted by XOR distance to
    /// `target`, excluding any ID in `exclude`.
    pub fn get_closest_contacts(
        &self,
        n: usize,
        target: &NodeId,
        filter: impl Fn(&T) -> bool,
        exclude: &[NodeId],
    ) -> Vec<(NodeId, T)> {
        let mut candidates: Vec<(NodeId, T)> = Vec::new();

        for bucket in &self.buckets {
            let bucket = bucket.read().unwrap();
            for (id, info) in bucket.iter() {
                if exclude.contains(id) {
                    continue;
                }
                if !filter(info) {
                    continue;
                }
                candidates.push((*id, info.clone()));
            }
        }

        candidates.sort_by_key(|(id, _)| id.distance(target));
        candidates.truncate(n);
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(byte: u8) -> NodeId {
        NodeId::from_bytes([byte; NODE_ID_LEN])
    }

    #[test]
    fn insert_and_get_roundtrip() {
        let table: RoutingTable<u32> = RoutingTable::new(id(0));
        let outcome = table.insert(id(1), 42);
        assert!(matches!(outcome, InsertOutcome::Inserted));
        assert_eq!(table.get(&id(1)), Some(42));
    }

    #[test]
    fn reinsert_updates_not_duplicates() {
        let table: RoutingTable<u32> = RoutingTable::new(id(0));
        table.insert(id(1), 42);
        let outcome = table.insert(id(1), 99);
        assert!(matches!(outcome, InsertOutcome::Updated));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn self_insert_is_ignored() {
        let local = id(0);
        let table: RoutingTable<u32> = RoutingTable::new(local);
        table.insert(local, 1);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn closest_contacts_sorted_by_distance_and_excludes() {
        let local = NodeId::from_bytes([0u8; NODE_ID_LEN]);
        let table: RoutingTable<u32> = RoutingTable::new(local);

        let mut a = [0u8; NODE_ID_LEN];
        a[0] = 0b0000_0001;
        let mut b = [0u8; NODE_ID_LEN];
        b[0] = 0b1000_0000;
        let target = NodeId::from_bytes([0u8; NODE_ID_LEN]);

        table.insert(NodeId::from_bytes(a), 1);
        table.insert(NodeId::from_bytes(b), 2);

        let closest = table.get_closest_contacts(5, &target, |_| true, &[]);
        assert_eq!(closest.len(), 2);
        assert_eq!(closest[0].0, NodeId::from_bytes(a));
    }

    #[test]
    fn closest_contacts_respects_filter_and_exclude() {
        let local = NodeId::from_bytes([0u8; NODE_ID_LEN]);
        let table: RoutingTable<u32> = RoutingTable::new(local);
        let a = NodeId::from_bytes([5u8; NODE_ID_LEN]);
        table.insert(a, 7);

        assert!(table.get_closest_contacts(5, &local, |_| false, &[]).is_empty());
        assert!(table
            .get_closest_contacts(5, &local, |_| true, &[a])
            .is_empty());
    }

    #[test]
    fn bucket_full_reports_eviction_candidate() {
        let local = NodeId::from_bytes([0u8; NODE_ID_LEN]);
        let table: RoutingTable<u32> = RoutingTable::new(local);

        // All these share the same bucket: flip only the lowest bit so
        // shared_prefix_len is identical (255) for all of them.
        for i in 0..BUCKET_SIZE as u8 {
            let mut bytes = [0u8; NODE_ID_LEN];
            bytes[NODE_ID_LEN - 1] = (i + 1) * 2;
            table.insert(NodeId::from_bytes(bytes), i as u32);
        }

        let mut overflow_bytes = [0u8; NODE_ID_LEN];
        overflow_bytes[NODE_ID_LEN - 1] = 255;
        let outcome = table.insert(NodeId::from_bytes(overflow_bytes), 999);
        assert!(matches!(outcome, InsertOutcome::BucketFull { .. }));
    }
}
