//! Collaborator traits (spec §6)
//!
//! The blockchain store and the content warehouse are explicitly out of
//! scope for this core (spec §1); this module defines the narrow trait
//! surface the core needs from them so `peernet-transport`'s block transfer
//! and `peernet-routing`'s FindValue handling can be generic over whatever
//! the embedding application provides, mirroring how
//! `indras-core::traits` abstracts storage/topology collaborators away
//! from the routing logic that consumes them.

use async_trait::async_trait;

/// Status of a single block fetch, mirrored from the Go source's
/// `blockchain.StatusOK` check in `Transfer Block.go`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    Ok,
    NotAvailable,
}

/// Abstraction over the out-of-scope user blockchain (spec §6,
/// "Blockchain store: GetBlockRaw(n) -> (bytes, status, err)").
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Fetch the raw bytes of block `n`.
    async fn get_block_raw(&self, n: u64) -> (Vec<u8>, BlockStatus);
}

/// Abstraction over the out-of-scope content warehouse, used to fulfill
/// FindValue requests whose data is small enough to embed (spec §4.E step
/// 5).
#[async_trait]
pub trait ValueStore: Send + Sync {
    /// Look up a value by its hash. Returns `None` if not stored locally.
    async fn get(&self, hash: &[u8]) -> Option<Vec<u8>>;

    /// Whether the value is stored and, if so, its size in bytes (without
    /// necessarily reading the whole payload).
    async fn size_of(&self, hash: &[u8]) -> Option<usize>;
}
