//! Decode errors (spec §7.1 — protocol violations are dropped by the
//! caller, never turned into a response).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("packet shorter than the fixed header")]
    Truncated,

    #[error("unsupported protocol byte: {0}")]
    BadProtocol(u8),

    #[error("unknown command byte: {0}")]
    UnknownCommand(u8),

    #[error("malformed field: {0}")]
    Malformed(&'static str),
}

pub type CodecResult<T> = Result<T, CodecError>;
