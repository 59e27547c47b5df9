use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("virtual connection terminated")]
    Terminated,

    #[error("returned block range is outside every requested target range")]
    InvalidBlockRange,

    #[error("cannot acquire a bidirectional sequence for this block transfer")]
    SequenceUnavailable,

    #[error("block header framing error: {0}")]
    Framing(#[from] peernet_codec::error::CodecError),

    #[error("remote closed the stream before the expected block count arrived")]
    UnexpectedEof,
}

pub type TransportResult<T> = Result<T, TransportError>;
