//! # Peernet Routing
//!
//! Announcement/Response protocol handling, the Traverse relay, the
//! information-request orchestrator, and the sequence registry that ties a
//! reply back to whatever sent the request (spec §4.E–§4.H).
//!
//! This crate knows about peers (`peernet-peerlist`) and the DHT
//! (`peernet-dht`) but nothing about sockets — dispatching decoded packets
//! to the functions here, and sending what they return, is `peernet-node`'s
//! job.

pub mod announcement;
pub mod error;
pub mod information_request;
pub mod sequence;
pub mod traverse;

pub use announcement::{handle_announcement, AnnouncementContext, StoreIndex};
pub use error::{RoutingError, RoutingResult};
pub use information_request::{InformationRequest, NodeMessage};
pub use sequence::{Sequence, SequenceData, SequenceDirection, SequenceRegistry};
pub use traverse::{forward, receive, ForwardContext, ReceiveContext, TraverseReceiveOutcome};
