//! Wire packet shape
//!
//! `PacketRaw` is the logical decoding of the fixed wire header described in
//! spec §6: `Protocol(1) | Command(1) | Sequence(4) | payload`. Byte-level
//! encode/decode lives in `peernet-codec`; this crate only defines the
//! shape and the `Command` enumeration so that every crate that needs to
//! match on a command (routing, transport, node) can do so without
//! depending on the codec.

/// Protocol byte value. Must always be 0 (spec §6).
pub const PROTOCOL_VERSION: u8 = 0;

/// Maximum packet size kept under typical path MTU to avoid IP
/// fragmentation (spec §4.B).
pub const MAX_PACKET_SIZE: usize = 508;

/// Wire commands (spec §6). Values are stable across the wire and must not
/// be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    Announcement = 0,
    Response = 1,
    Ping = 2,
    Pong = 3,
    Chat = 4,
    LocalDiscovery = 5,
    Traverse = 6,
    GetBlock = 7,
    /// Reserved range for transport-internal controls (UDT-style ACK/NAK
    /// frames multiplexed over the same command space, spec §4.I).
    TransportControl = 8,
}

impl Command {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Command::Announcement,
            1 => Command::Response,
            2 => Command::Ping,
            3 => Command::Pong,
            4 => Command::Chat,
            5 => Command::LocalDiscovery,
            6 => Command::Traverse,
            7 => Command::GetBlock,
            8 => Command::TransportControl,
            _ => return None,
        })
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Logical decoding of the fixed wire header plus payload bytes.
#[derive(Debug, Clone)]
pub struct PacketRaw {
    pub protocol: u8,
    pub command: Command,
    pub sequence: u32,
    pub payload: Vec<u8>,
}

impl PacketRaw {
    pub fn new(command: Command, sequence: u32, payload: Vec<u8>) -> Self {
        Self {
            protocol: PROTOCOL_VERSION,
            command,
            sequence,
            payload,
        }
    }

    pub fn is_valid_protocol(&self) -> bool {
        self.protocol == PROTOCOL_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_roundtrip() {
        for v in 0u8..=8 {
            let cmd = Command::from_u8(v).unwrap();
            assert_eq!(cmd.as_u8(), v);
        }
    }

    #[test]
    fn unknown_command_is_none() {
        assert!(Command::from_u8(200).is_none());
    }
}
