//! Reliable-channel control frames (spec §4.I)
//!
//! Segments carry the application byte stream; `Ack`/`Ack2` are the
//! receiver's cumulative acknowledgment and the sender's ack-of-ack, the
//! pair [`crate::ack_history::AckHistoryHeap`] exists to track. All three
//! share the same wire space inside a `GetBlock` `Active` packet's payload,
//! tagged by a leading type byte.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{TransportError, TransportResult};

/// Largest segment payload kept well under the packet size ceiling (spec
/// §4.B `MAX_PACKET_SIZE` minus the fixed header and this frame's own
/// overhead).
pub const MAX_SEGMENT_PAYLOAD: usize = 450;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Segment { packet_id: u32, data: Vec<u8> },
    Ack { ack_id: u32, last_packet: u32 },
    Ack2 { ack_id: u32 },
}

const TAG_SEGMENT: u8 = 0;
const TAG_ACK: u8 = 1;
const TAG_ACK2: u8 = 2;

impl Frame {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        match self {
            Frame::Segment { packet_id, data } => {
                buf.put_u8(TAG_SEGMENT);
                buf.put_u32(*packet_id);
                buf.put_u32(data.len() as u32);
                buf.put_slice(data);
            }
            Frame::Ack { ack_id, last_packet } => {
                buf.put_u8(TAG_ACK);
                buf.put_u32(*ack_id);
                buf.put_u32(*last_packet);
            }
            Frame::Ack2 { ack_id } => {
                buf.put_u8(TAG_ACK2);
                buf.put_u32(*ack_id);
            }
        }
        buf.freeze()
    }

    pub fn decode(mut bytes: &[u8]) -> TransportResult<Self> {
        if bytes.remaining() < 1 {
            return Err(TransportError::UnexpectedEof);
        }
        match bytes.get_u8() {
            TAG_SEGMENT => {
                if bytes.remaining() < 8 {
                    return Err(TransportError::UnexpectedEof);
                }
                let packet_id = bytes.get_u32();
                let len = bytes.get_u32() as usize;
                if bytes.remaining() < len {
                    return Err(TransportError::UnexpectedEof);
                }
                let data = bytes[..len].to_vec();
                Ok(Frame::Segment { packet_id, data })
            }
            TAG_ACK => {
                if bytes.remaining() < 8 {
                    return Err(TransportError::UnexpectedEof);
                }
                Ok(Frame::Ack {
                    ack_id: bytes.get_u32(),
                    last_packet: bytes.get_u32(),
                })
            }
            TAG_ACK2 => {
                if bytes.remaining() < 4 {
                    return Err(TransportError::UnexpectedEof);
                }
                Ok(Frame::Ack2 {
                    ack_id: bytes.get_u32(),
                })
            }
            _ => Err(TransportError::Framing(peernet_codec::error::CodecError::Malformed(
                "unknown reliable-channel frame tag",
            ))),
        }
    }
}

/// Split a byte buffer into consecutively numbered segments starting at
/// `first_packet_id`.
pub fn segment_data(first_packet_id: u32, data: &[u8]) -> Vec<Frame> {
    data.chunks(MAX_SEGMENT_PAYLOAD)
        .enumerate()
        .map(|(n, chunk)| Frame::Segment {
            packet_id: first_packet_id + n as u32,
            data: chunk.to_vec(),
        })
        .collect()
}
