//! Error taxonomy for Peernet (spec §7)
//!
//! Each crate defines its own `thiserror` enum for the errors it can
//! produce; this module aggregates them into [`PeernetError`] the way
//! `indras-core::error::IndrasError` aggregates its per-concern errors.
//! Protocol violations and stale messages (spec §7.1/§7.2) are handled by
//! dropping at the call site — they do not need an `Err` variant, since a
//! dropped packet never reaches a caller.

use thiserror::Error;

/// Top-level error type for the Peernet core.
#[derive(Debug, Error)]
pub enum PeernetError {
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("sequence error: {0}")]
    Sequence(#[from] SequenceError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Errors related to cryptography (spec §7.7 — never panics the caller).
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("signature verification failed")]
    SignatureInvalid,

    #[error("sender is self")]
    SenderIsSelf,

    #[error("malformed ciphertext: {0}")]
    Malformed(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),
}

/// Errors related to DHT routing (spec §4.D).
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("no contacts available for query")]
    NoContacts,

    #[error("target peer not known")]
    TargetUnknown,
}

/// Errors related to announcement/response/traverse handling (spec §7.1).
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid packet framing")]
    InvalidFraming,

    #[error("unsolicited response")]
    Unsolicited,

    #[error("message expired")]
    Expired,

    #[error("unknown command byte: {0}")]
    UnknownCommand(u8),
}

/// Errors surfaced by the sequence registry (spec §7.5).
#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("sequence space exhausted")]
    Exhausted,

    #[error("no sequence registered for ({0}, {1})")]
    NotFound(String, u32),
}

/// Errors surfaced by the reliable transport (spec §7.6).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection terminated")]
    Terminated,

    #[error("requested block range outside target ranges")]
    InvalidBlockRange,

    #[error("io error: {0}")]
    Io(String),

    #[error("peer unreachable")]
    PeerUnreachable,
}

/// Result alias for Peernet operations.
pub type PeernetResult<T> = Result<T, PeernetError>;
