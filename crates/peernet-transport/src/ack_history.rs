//! ACK history heap (spec §4.I)
//!
//! Tracks every ACK the sender has issued so a returning acknowledgment can
//! be matched back to the packet range it covers. Grounded directly on
//! `examples/original_source/udt/ack_history_heap.go`: `Add` performs no
//! deduplication, and `Remove` prunes every earlier entry whose
//! `last_packet` is still behind the one just acknowledged — once a later
//! packet is confirmed, nothing earlier needs to be retransmitted either.

use std::sync::RwLock;
use std::time::Instant;

/// One outstanding ACK: the ID assigned to it and the highest packet
/// sequence number it covers.
#[derive(Debug, Clone, Copy)]
pub struct AckHistoryEntry {
    pub ack_id: u32,
    pub last_packet: u32,
    pub send_time: Instant,
}

/// History of ACKs sent, awaiting acknowledgment from the peer.
#[derive(Default)]
pub struct AckHistoryHeap {
    list: RwLock<Vec<AckHistoryEntry>>,
}

impl AckHistoryHeap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new ACK. No deduplication is performed, matching the
    /// original: a retransmitted ACK for the same range is simply a second
    /// entry.
    pub fn add(&self, entry: AckHistoryEntry) {
        self.list.write().unwrap().push(entry);
    }

    /// Acknowledge `ack_id`, returning its entry if found, and drop every
    /// other entry whose `last_packet` doesn't exceed it — they are implied
    /// acknowledged by this one covering a later packet.
    pub fn remove(&self, ack_id: u32) -> Option<AckHistoryEntry> {
        let mut list = self.list.write().unwrap();

        let found = list.iter().find(|e| e.ack_id == ack_id).copied()?;

        list.retain(|e| e.ack_id != ack_id && e.last_packet > found.last_packet);

        Some(found)
    }

    pub fn count(&self) -> usize {
        self.list.read().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ack_id: u32, last_packet: u32) -> AckHistoryEntry {
        AckHistoryEntry {
            ack_id,
            last_packet,
            send_time: Instant::now(),
        }
    }

    #[test]
    fn add_does_not_deduplicate() {
        let heap = AckHistoryHeap::new();
        heap.add(entry(1, 10));
        heap.add(entry(1, 10));
        assert_eq!(heap.count(), 2);
    }

    #[test]
    fn remove_returns_none_for_unknown_id() {
        let heap = AckHistoryHeap::new();
        heap.add(entry(1, 10));
        assert!(heap.remove(99).is_none());
        assert_eq!(heap.count(), 1);
    }

    #[test]
    fn remove_prunes_entries_with_lower_last_packet() {
        let heap = AckHistoryHeap::new();
        heap.add(entry(1, 10));
        heap.add(entry(2, 20));
        heap.add(entry(3, 30));

        let found = heap.remove(2).unwrap();
        assert_eq!(found.ack_id, 2);

        // entry 1 (last_packet=10) is behind the acknowledged 20, pruned.
        // entry 3 (last_packet=30) is ahead, kept.
        assert_eq!(heap.count(), 1);
    }

    #[test]
    fn remove_keeps_entries_ahead_of_acknowledged_packet() {
        let heap = AckHistoryHeap::new();
        heap.add(entry(1, 5));
        heap.add(entry(2, 50));

        heap.remove(1);
        assert_eq!(heap.count(), 1);
    }
}
