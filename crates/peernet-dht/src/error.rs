use thiserror::Error;

#[derive(Debug, Error)]
pub enum DhtError {
    #[error("target node id equals local node id")]
    TargetIsSelf,
}

pub type DhtResult<T> = Result<T, DhtError>;
