//! # Peernet Codec
//!
//! Wire encode/decode for the Peernet core (spec §6). Owns every byte
//! layout that's normative across the wire: the fixed packet header, the
//! 55-byte `PeerRecord`, and the Announcement/Response/Traverse/GetBlock
//! payloads. Business logic that decides *what* to send lives in
//! `peernet-routing` and `peernet-transport`; this crate only knows how to
//! turn their decisions into bytes and back.

pub mod announcement;
pub mod error;
pub mod framing;
pub mod get_block;
pub mod header;
pub mod peer_record;
pub mod response;
pub mod traverse;

pub use error::{CodecError, CodecResult};
pub use peer_record::PeerRecord;
