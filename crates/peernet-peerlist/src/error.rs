use thiserror::Error;

#[derive(Debug, Error)]
pub enum PeerlistError {
    #[error("peer not found")]
    NotFound,
}

pub type PeerlistResult<T> = Result<T, PeerlistError>;
