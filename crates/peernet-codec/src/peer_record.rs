//! `PeerRecord` wire layout (spec §6, 55 bytes fixed)
//!
//! Spec §6 writes the layout as `PublicKey(33) | NodeID(N) | IP(16) |
//! Port(2) | PortInternal(2) | Flags(…)` totalling 55 bytes, but NodeID is
//! always derived deterministically from the compressed public key (spec
//! §3/§4.A) — carrying it separately would make the 55-byte count impossible
//! to reach with a 32-byte NodeID, and would let a malicious peer advertise
//! a NodeID that doesn't match its key. This codec derives NodeID from
//! PublicKey on decode instead of transmitting it, which reconciles the byte
//! count exactly: `33 + 16 + 2 + 2 + 2 = 55` (see DESIGN.md).

use bytes::{Buf, BufMut, BytesMut};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use peernet_core::address::PeerAddress;
use peernet_core::identity::NodeId;
use peernet_crypto::PublicKey;

use crate::error::{CodecError, CodecResult};

pub const PEER_RECORD_LEN: usize = 55;

const FLAG_IS_IPV6: u16 = 1 << 0;
const FLAG_HAS_INTERNAL_PORT: u16 = 1 << 1;

/// A peer's identity and address as exchanged in Announcement/Response
/// payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    pub public_key: PublicKey,
    pub address: PeerAddress,
}

impl PeerRecord {
    pub fn new(public_key: PublicKey, address: PeerAddress) -> Self {
        Self {
            public_key,
            address,
        }
    }

    /// NodeID derived from the embedded public key, never transmitted.
    pub fn node_id(&self) -> NodeId {
        self.public_key.node_id()
    }

    pub fn encode(&self) -> [u8; PEER_RECORD_LEN] {
        let mut buf = BytesMut::with_capacity(PEER_RECORD_LEN);
        buf.put_slice(&self.public_key.to_compressed());

        let mut flags = 0u16;
        let mut ip_bytes = [0u8; 16];
        match self.address.ip {
            IpAddr::V4(v4) => {
                ip_bytes[12..16].copy_from_slice(&v4.octets());
            }
            IpAddr::V6(v6) => {
                ip_bytes.copy_from_slice(&v6.octets());
                flags |= FLAG_IS_IPV6;
            }
        }
        buf.put_slice(&ip_bytes);
        buf.put_u16(self.address.port);

        if let Some(internal) = self.address.port_internal {
            flags |= FLAG_HAS_INTERNAL_PORT;
            buf.put_u16(internal);
        } else {
            buf.put_u16(0);
        }
        buf.put_u16(flags);

        let mut out = [0u8; PEER_RECORD_LEN];
        out.copy_from_slice(&buf);
        out
    }

    pub fn decode(mut bytes: &[u8]) -> CodecResult<Self> {
        if bytes.len() != PEER_RECORD_LEN {
            return Err(CodecError::Malformed("peer record must be 55 bytes"));
        }

        let mut pubkey_bytes = [0u8; 33];
        bytes.copy_to_slice(&mut pubkey_bytes);
        let public_key = PublicKey::from_compressed(&pubkey_bytes)
            .map_err(|_| CodecError::Malformed("invalid peer record public key"))?;

        let mut ip_bytes = [0u8; 16];
        bytes.copy_to_slice(&mut ip_bytes);
        let port = bytes.get_u16();
        let port_internal_raw = bytes.get_u16();
        let flags = bytes.get_u16();

        let ip = if flags & FLAG_IS_IPV6 != 0 {
            IpAddr::V6(Ipv6Addr::from(ip_bytes))
        } else {
            let mut v4 = [0u8; 4];
            v4.copy_from_slice(&ip_bytes[12..16]);
            IpAddr::V4(Ipv4Addr::from(v4))
        };

        let mut address = PeerAddress::new(ip, port);
        if flags & FLAG_HAS_INTERNAL_PORT != 0 {
            address = address.with_internal_port(port_internal_raw);
        }

        Ok(PeerRecord {
            public_key,
            address,
        })
    }
}
