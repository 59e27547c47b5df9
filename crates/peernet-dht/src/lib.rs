//! # Peernet DHT
//!
//! Kademlia k-bucket routing table keyed by XOR distance (spec §3 "DHTNode",
//! §4.D). Generic over the opaque payload each bucket entry carries — in
//! practice an `Arc<peernet_peerlist::PeerInfo>` supplied by
//! `peernet-routing` — so this crate has no dependency on peer/connection
//! state, only on `NodeId` distance math.

pub mod bucket;
pub mod error;
pub mod table;

pub use error::{DhtError, DhtResult};
pub use table::{InsertOutcome, RoutingTable};
