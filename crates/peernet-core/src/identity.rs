//! Node identifiers and capability bits
//!
//! [`NodeId`] is the XOR-metric identifier used by the DHT routing table
//! (spec §3, "NodeID"). It is derived deterministically from a peer's
//! compressed public key by `peernet-crypto` — this crate only knows how to
//! compare and display the resulting bytes, not how to derive them, so that
//! it has no dependency on a curve implementation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Width of a [`NodeId`] in bytes (spec §3: "commonly 32 bytes").
pub const NODE_ID_LEN: usize = 32;

/// XOR-metric overlay identifier of a peer, derived from its public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub [u8; NODE_ID_LEN]);

impl NodeId {
    pub const ZERO: NodeId = NodeId([0u8; NODE_ID_LEN]);

    pub fn from_bytes(bytes: [u8; NODE_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; NODE_ID_LEN] {
        &self.0
    }

    /// XOR distance to another node, interpreted big-endian (spec §3).
    pub fn distance(&self, other: &NodeId) -> NodeId {
        let mut out = [0u8; NODE_ID_LEN];
        for i in 0..NODE_ID_LEN {
            out[i] = self.0[i] ^ other.0[i];
        }
        NodeId(out)
    }

    /// Length of the shared prefix (in bits) with another node, used to
    /// select the Kademlia bucket index.
    pub fn shared_prefix_len(&self, other: &NodeId) -> usize {
        let dist = self.distance(other);
        for (byte_idx, byte) in dist.0.iter().enumerate() {
            if *byte != 0 {
                return byte_idx * 8 + byte.leading_zeros() as usize;
            }
        }
        NODE_ID_LEN * 8
    }
}

impl PartialOrd for NodeId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeId {
    /// Big-endian byte-wise comparison, used to order nodes by XOR distance
    /// once they've already been XORed against a target.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Capability bits advertised in an Announcement (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Features(pub u32);

impl Features {
    pub const IPV4_LISTEN: Features = Features(1 << 0);
    pub const IPV6_LISTEN: Features = Features(1 << 1);
    pub const FIREWALL: Features = Features(1 << 2);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }
}

impl std::ops::BitOr for Features {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for Features {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}
