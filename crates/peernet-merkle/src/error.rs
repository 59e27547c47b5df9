use thiserror::Error;

#[derive(Debug, Error)]
pub enum MerkleError {
    #[error("fragment size must be non-zero")]
    ZeroFragmentSize,

    #[error("input reader ended before fileSize bytes were read")]
    ShortRead,
}

pub type MerkleResult<T> = Result<T, MerkleError>;
