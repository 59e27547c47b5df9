//! # Peernet Peerlist
//!
//! Peer bookkeeping for the Peernet core (spec §4.C): the process-wide
//! [`Peerlist`] arena, per-peer [`PeerInfo`] and [`Connection`] state, and
//! the auto-ping loop's single-tick logic in [`autoping`].
//!
//! This crate deliberately has no networking or codec dependency — it
//! decides *which* connections need a ping, an invalidate, or a remove;
//! the caller (`peernet-node`) is the one that actually owns a socket and
//! the codec to act on that decision.

pub mod autoping;
pub mod connection;
pub mod error;
pub mod peer_info;
pub mod peerlist;

pub use connection::{Connection, ConnectionStatus};
pub use error::{PeerlistError, PeerlistResult};
pub use peer_info::PeerInfo;
pub use peerlist::Peerlist;
