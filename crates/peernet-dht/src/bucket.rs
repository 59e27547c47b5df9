//! A single Kademlia k-bucket

use std::collections::VecDeque;
use std::time::Instant;

use peernet_core::identity::NodeId;

/// Maximum entries per bucket before an insert must evict the
/// least-recently-seen member (spec §4.D). 20 is the usual Kademlia
/// default; the spec doesn't pin a value, so this is an Open Question
/// decision recorded in DESIGN.md.
pub const BUCKET_SIZE: usize = 20;

pub(crate) struct Entry<T> {
    pub id: NodeId,
    pub info: T,
    pub last_seen: Instant,
}

/// Ordered by least-recently-seen at the front, most-recently-seen at the
/// back — the usual Kademlia bucket ordering, so probing/eviction always
/// looks at the front.
pub(crate) struct Bucket<T> {
    entries: VecDeque<Entry<T>>,
}

impl<T> Bucket<T> {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= BUCKET_SIZE
    }

    pub fn find(&self, id: &NodeId) -> Option<usize> {
        self.entries.iter().position(|e| &e.id == id)
    }

    /// Move the entry at `id` to the back (most-recently-seen) and refresh
    /// its timestamp.
    pub fn touch(&mut self, id: &NodeId) -> bool {
        if let Some(idx) = self.find(id) {
            let mut entry = self.entries.remove(idx).unwrap();
            entry.last_seen = Instant::now();
            self.entries.push_back(entry);
            true
        } else {
            false
        }
    }

    pub fn push_back(&mut self, id: NodeId, info: T) {
        self.entries.push_back(Entry {
            id,
            info,
            last_seen: Instant::now(),
        });
    }

    /// The least-recently-seen entry, a probe candidate for eviction
    /// (spec §4.D: "Eviction replaces the least-recently-seen member of the
    /// bucket if it fails to respond to a probe").
    pub fn least_recently_seen(&self) -> Option<&NodeId> {
        self.entries.front().map(|e| &e.id)
    }

    pub fn remove(&mut self, id: &NodeId) -> Option<T> {
        let idx = self.find(id)?;
        self.entries.remove(idx).map(|e| e.info)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &T)> {
        self.entries.iter().map(|e| (&e.id, &e.info))
    }

    pub fn get(&self, id: &NodeId) -> Option<&T> {
        self.entries.iter().find(|e| &e.id == id).map(|e| &e.info)
    }
}
