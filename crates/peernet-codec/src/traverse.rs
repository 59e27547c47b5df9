//! `MessageTraverse` payload (spec §4.G, §6)
//!
//! The Forward role rewrites only the address sub-fields (`ipv4`, `port_*`,
//! `ipv6`, `port_ipv6_*`) before re-sending; `signer_public_key`,
//! `sender_public_key`, `target_peer`, `expires` and `embedded_packet_raw`
//! are left untouched, which is why they're kept as plain fields here rather
//! than folded into a sub-struct — `MessageTraverse { ipv4: x, ..traverse }`
//! reads directly as "rewrite the address, keep everything else".

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::net::Ipv4Addr;
use std::net::Ipv6Addr;

use peernet_crypto::PublicKey;

use crate::error::{CodecError, CodecResult};
use crate::framing;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTraverse {
    pub signer_public_key: PublicKey,
    pub sender_public_key: PublicKey,
    pub target_peer: PublicKey,
    /// Unix timestamp (seconds) after which the solicitation is stale.
    pub expires: u64,
    pub ipv4: Ipv4Addr,
    pub port_ipv4: u16,
    pub port_ipv4_reported_external: u16,
    pub ipv6: Ipv6Addr,
    pub port_ipv6: u16,
    pub port_ipv6_reported_external: u16,
    /// The signed, wire-encoded Announcement packet to dispatch against the
    /// virtual peer once relayed (spec §4.G Receive role).
    pub embedded_packet_raw: Vec<u8>,
}

impl MessageTraverse {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_slice(&self.signer_public_key.to_compressed());
        buf.put_slice(&self.sender_public_key.to_compressed());
        buf.put_slice(&self.target_peer.to_compressed());
        buf.put_u64(self.expires);
        buf.put_slice(&self.ipv4.octets());
        buf.put_u16(self.port_ipv4);
        buf.put_u16(self.port_ipv4_reported_external);
        buf.put_slice(&self.ipv6.octets());
        buf.put_u16(self.port_ipv6);
        buf.put_u16(self.port_ipv6_reported_external);
        framing::put_bytes_u16(&mut buf, &self.embedded_packet_raw);
        buf.freeze()
    }

    pub fn decode(mut bytes: &[u8]) -> CodecResult<Self> {
        let signer_public_key = read_pubkey(&mut bytes)?;
        let sender_public_key = read_pubkey(&mut bytes)?;
        let target_peer = read_pubkey(&mut bytes)?;

        if bytes.remaining() < 8 {
            return Err(CodecError::Truncated);
        }
        let expires = bytes.get_u64();

        if bytes.remaining() < 4 {
            return Err(CodecError::Truncated);
        }
        let mut v4 = [0u8; 4];
        bytes.copy_to_slice(&mut v4);
        let ipv4 = Ipv4Addr::from(v4);

        if bytes.remaining() < 4 {
            return Err(CodecError::Truncated);
        }
        let port_ipv4 = bytes.get_u16();
        let port_ipv4_reported_external = bytes.get_u16();

        if bytes.remaining() < 16 {
            return Err(CodecError::Truncated);
        }
        let mut v6 = [0u8; 16];
        bytes.copy_to_slice(&mut v6);
        let ipv6 = Ipv6Addr::from(v6);

        if bytes.remaining() < 4 {
            return Err(CodecError::Truncated);
        }
        let port_ipv6 = bytes.get_u16();
        let port_ipv6_reported_external = bytes.get_u16();

        let embedded_packet_raw = framing::get_bytes_u16(&mut bytes)?;

        Ok(MessageTraverse {
            signer_public_key,
            sender_public_key,
            target_peer,
            expires,
            ipv4,
            port_ipv4,
            port_ipv4_reported_external,
            ipv6,
            port_ipv6,
            port_ipv6_reported_external,
            embedded_packet_raw,
        })
    }

    /// True when the Forward role's strict replay-safety precondition holds
    /// (spec §4.G): the link this packet arrived on must be from the same
    /// key that both signed and claims to have sent it.
    pub fn is_direct_from_signer(&self, link_peer: &PublicKey) -> bool {
        self.signer_public_key == self.sender_public_key && self.sender_public_key == *link_peer
    }

    /// Preferred external address per family, favoring the reported-external
    /// port when the peer observed one (non-zero), per spec §4.G Receive role.
    pub fn preferred_port_ipv4(&self) -> u16 {
        if self.port_ipv4_reported_external != 0 {
            self.port_ipv4_reported_external
        } else {
            self.port_ipv4
        }
    }

    pub fn preferred_port_ipv6(&self) -> u16 {
        if self.port_ipv6_reported_external != 0 {
            self.port_ipv6_reported_external
        } else {
            self.port_ipv6
        }
    }
}

fn read_pubkey(bytes: &mut &[u8]) -> CodecResult<PublicKey> {
    if bytes.remaining() < 33 {
        return Err(CodecError::Truncated);
    }
    let mut raw = [0u8; 33];
    bytes.copy_to_slice(&mut raw);
    PublicKey::from_compressed(&raw).map_err(|_| CodecError::Malformed("invalid traverse public key"))
}
