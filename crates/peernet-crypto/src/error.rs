//! Error types for peernet-crypto

use thiserror::Error;

/// Errors that can occur during cryptographic operations (spec §7.7 — the
/// receiver never panics on any of these, it drops and moves on).
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("key generation failed: {0}")]
    KeyGenerationFailed(String),

    #[error("signature verification failed")]
    SignatureVerificationFailed,

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("sender is self")]
    SenderIsSelf,

    #[error("data too short: expected at least {expected} bytes, got {actual}")]
    DataTooShort { expected: usize, actual: usize },
}

/// Result type for crypto operations
pub type CryptoResult<T> = Result<T, CryptoError>;
