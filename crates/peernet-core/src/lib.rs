//! # Peernet Core
//!
//! Shared identity, address, packet-framing, and error types used across the
//! Peernet workspace: the [`NodeId`] XOR-metric identifier, [`PeerAddress`],
//! the fixed [`PacketRaw`] wire header, and the [`PeernetError`] aggregation
//! every other crate's error type folds into.
//!
//! This crate intentionally has no networking or cryptography code of its
//! own — those live in `peernet-crypto`, `peernet-codec`, and friends — so
//! that simulation and production builds can share these definitions without
//! pulling in an async runtime or a curve implementation.

pub mod address;
pub mod error;
pub mod identity;
pub mod packet;
pub mod traits;

pub use address::PeerAddress;
pub use error::{
    CryptoError, PeernetError, PeernetResult, ProtocolError, RoutingError, SequenceError,
    TransportError,
};
pub use identity::{Features, NodeId, NODE_ID_LEN};
pub use packet::{Command, PacketRaw, MAX_PACKET_SIZE, PROTOCOL_VERSION};
pub use traits::{BlockSource, BlockStatus, ValueStore};
