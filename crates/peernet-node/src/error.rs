//! Error types for the node coordinator

use thiserror::Error;

/// Errors that can occur wiring and running a node.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("keystore error: {0}")]
    Keystore(String),

    #[error("node already started")]
    AlreadyStarted,

    #[error("node not started")]
    NotStarted,

    #[error("no local listen address configured for the requested address family")]
    NoListenAddress,

    #[error("routing error: {0}")]
    Routing(#[from] peernet_routing::RoutingError),

    #[error("transport error: {0}")]
    Transport(#[from] peernet_transport::TransportError),
}

pub type NodeResult<T> = Result<T, NodeError>;
