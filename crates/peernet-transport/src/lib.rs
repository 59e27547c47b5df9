//! # Peernet Transport
//!
//! Reliable block-transfer channel layered on a custom UDT-style packet
//! protocol (spec §4.I). [`VirtualPacketConn`] turns one registered
//! bidirectional sequence into a logical duplex byte channel;
//! [`ReliableChannel`] adds segment framing, cumulative ACKs and
//! retransmission on top; [`block_transfer`] implements the sender and
//! requester roles of the block-transfer protocol itself.
//!
//! This crate has no socket of its own — `peernet-node` owns the UDP
//! socket, decodes `GetBlock` packets, and feeds their payloads to the
//! matching [`VirtualPacketConn`] via
//! [`VirtualPacketConn::deliver_incoming`].

pub mod ack_history;
pub mod block_transfer;
pub mod error;
pub mod frame;
pub mod reliable;
pub mod virtual_conn;

pub use ack_history::{AckHistoryEntry, AckHistoryHeap};
pub use block_transfer::{build_request_start, download_blocks, read_one_block, start_block_transfer};
pub use error::{TransportError, TransportResult};
pub use frame::Frame;
pub use reliable::ReliableChannel;
pub use virtual_conn::VirtualPacketConn;
