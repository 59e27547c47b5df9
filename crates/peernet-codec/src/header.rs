//! Fixed wire header encode/decode (spec §6)
//!
//! `Protocol(1) | Command(1) | Sequence(4) | payload(..)`, all integers in
//! network byte order. This is the only framing every packet shares; command
//! payloads are decoded by the other modules in this crate once the caller
//! has matched on [`Command`].

use bytes::{Buf, BufMut, Bytes, BytesMut};

use peernet_core::packet::{Command, PacketRaw, PROTOCOL_VERSION};

use crate::error::{CodecError, CodecResult};

const HEADER_LEN: usize = 1 + 1 + 4;

/// Encode a [`PacketRaw`] into its wire bytes, header followed by payload.
pub fn encode(packet: &PacketRaw) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + packet.payload.len());
    buf.put_u8(packet.protocol);
    buf.put_u8(packet.command.as_u8());
    buf.put_u32(packet.sequence);
    buf.put_slice(&packet.payload);
    buf.freeze()
}

/// Decode the fixed header and split off the payload. Unknown commands and
/// a non-zero protocol byte are reported rather than silently dropped, since
/// spec §7.1 treats "drop silently" as a dispatcher-level policy, not a
/// codec-level one.
pub fn decode(mut bytes: &[u8]) -> CodecResult<PacketRaw> {
    if bytes.len() < HEADER_LEN {
        return Err(CodecError::Truncated);
    }

    let protocol = bytes.get_u8();
    if protocol != PROTOCOL_VERSION {
        return Err(CodecError::BadProtocol(protocol));
    }

    let command_byte = bytes.get_u8();
    let command = Command::from_u8(command_byte).ok_or(CodecError::UnknownCommand(command_byte))?;

    let sequence = bytes.get_u32();
    let payload = bytes.to_vec();

    Ok(PacketRaw {
        protocol,
        command,
        sequence,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let packet = PacketRaw::new(Command::Ping, 42, vec![1, 2, 3]);
        let encoded = encode(&packet);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.command, Command::Ping);
        assert_eq!(decoded.sequence, 42);
        assert_eq!(decoded.payload, vec![1, 2, 3]);
    }

    #[test]
    fn empty_payload_roundtrips() {
        let packet = PacketRaw::new(Command::Pong, 0, vec![]);
        let decoded = decode(&encode(&packet)).unwrap();
        assert_eq!(decoded.payload, Vec::<u8>::new());
    }

    #[test]
    fn rejects_truncated_header() {
        assert!(matches!(decode(&[0, 1]), Err(CodecError::Truncated)));
    }

    #[test]
    fn rejects_bad_protocol() {
        let bytes = [7u8, 0, 0, 0, 0, 0];
        assert!(matches!(decode(&bytes), Err(CodecError::BadProtocol(7))));
    }

    #[test]
    fn rejects_unknown_command() {
        let bytes = [0u8, 200, 0, 0, 0, 0];
        assert!(matches!(
            decode(&bytes),
            Err(CodecError::UnknownCommand(200))
        ));
    }
}
