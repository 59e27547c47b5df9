use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("traverse signer/sender/link-peer mismatch")]
    TraverseSignerMismatch,

    #[error("traverse solicitation expired")]
    TraverseExpired,

    #[error("traverse target peer unknown")]
    TraverseTargetUnknown,

    #[error("traverse signer is already directly connected")]
    TraverseAlreadyConnected,

    #[error("traverse target has no shareable address for the requested family")]
    TraverseNoSharableAddress,

    #[error("embedded traverse packet is not an Announcement")]
    TraverseEmbeddedNotAnnouncement,

    #[error("embedded traverse packet sender does not match signer")]
    TraverseEmbeddedSenderMismatch,

    #[error("response carries no matching in-flight sequence, discarded")]
    UnsolicitedResponse,

    #[error("bootstrap FIND_SELF response key does not match local node id")]
    BootstrapKeyMismatch,
}

pub type RoutingResult<T> = Result<T, RoutingError>;
