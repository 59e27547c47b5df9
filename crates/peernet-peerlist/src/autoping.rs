//! The auto-ping loop (spec §4.C, §5 — "single task, wakes every second")
//!
//! This module implements one tick of the loop as a plain function rather
//! than spawning its own task, so `peernet-node` can drive it from its own
//! `tokio::time::interval` the way the teacher wires its background workers
//! from the top-level crate rather than burying `tokio::spawn` inside a
//! library crate.

use std::time::Instant;

use peernet_core::address::PeerAddress;
use peernet_core::identity::NodeId;
use tracing::debug;

use crate::peerlist::Peerlist;

/// What the tick wants the caller to do with a connection, since this crate
/// has no transport dependency of its own to actually send a Ping packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingAction {
    SendPing,
    Invalidate,
    Remove,
}

#[derive(Debug, Clone, Copy)]
pub struct PingTask {
    pub node_id: NodeId,
    pub address: PeerAddress,
    pub action: PingAction,
}

/// Run one tick of the auto-ping loop (spec §4.C):
///
/// - Active connections past their invalidate threshold move to inactive.
/// - Active connections due for a ping (and not pinged too recently) are
///   reported as [`PingAction::SendPing`].
/// - Inactive connections past the remove threshold are dropped, but only
///   if there's at least one active connection left or more than two
///   inactive ones — otherwise they're pinged instead, giving a
///   single-path peer a chance to come back.
pub fn tick(peerlist: &Peerlist) -> Vec<PingTask> {
    let now = Instant::now();
    let mut tasks = Vec::new();

    for peer in peerlist.snapshot() {
        for conn in peer.get_connections(true) {
            if conn.is_stale_for_invalidate(now) {
                tasks.push(PingTask {
                    node_id: peer.node_id,
                    address: conn.address,
                    action: PingAction::Invalidate,
                });
            } else if conn.due_for_ping_now() {
                tasks.push(PingTask {
                    node_id: peer.node_id,
                    address: conn.address,
                    action: PingAction::SendPing,
                });
            }
        }
        peer.invalidate_stale(now);

        let active_count = peer.active_count();
        let inactive_count = peer.inactive_count();
        for conn in peer.get_connections(false) {
            if conn.is_expired_for_remove(now) && (active_count >= 1 || inactive_count > 2) {
                tasks.push(PingTask {
                    node_id: peer.node_id,
                    address: conn.address,
                    action: PingAction::Remove,
                });
            } else if conn.due_for_ping_now() {
                tasks.push(PingTask {
                    node_id: peer.node_id,
                    address: conn.address,
                    action: PingAction::SendPing,
                });
            }
        }

        if peer.has_no_connections() {
            debug!(node_id = %peer.node_id, "peer has no remaining connections");
        }
    }

    tasks
}
