//! # Peernet Merkle
//!
//! BLAKE3-256 Merkle tree over a file's fixed-size fragments (spec §4.J):
//! build a tree from fragment data, produce a per-fragment verification
//! path, and verify a fragment's hash against a known root without holding
//! the whole tree.
//!
//! Grounded on `examples/original_source/fragment/Merkle Tree.go` —
//! `calculateMiddleHashes`'s uneven-leaf promotion (a lone right-most node
//! per level is carried up unchanged rather than hashed against itself) is
//! preserved exactly, since it's load-bearing for matching verification
//! paths against a root built by any other correct implementation.

pub mod error;
pub mod tree;

pub use error::{MerkleError, MerkleResult};
pub use tree::{merkle_verify, Hash32, MerkleTree, Side};
