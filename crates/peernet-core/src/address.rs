//! Peer network addresses
//!
//! A [`PeerAddress`] ties an IP to the external port a peer is reachable on
//! and, when known, the internal port behind a NAT (spec §3, "PeerAddress").

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// A peer's network address: IP plus external/internal ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerAddress {
    pub ip: IpAddr,
    /// Port the peer is externally reachable on.
    pub port: u16,
    /// Port the peer listens on behind its own NAT, if known/hinted.
    pub port_internal: Option<u16>,
}

impl PeerAddress {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self {
            ip,
            port,
            port_internal: None,
        }
    }

    pub fn with_internal_port(mut self, port_internal: u16) -> Self {
        self.port_internal = Some(port_internal);
        self
    }

    pub fn is_ipv4(&self) -> bool {
        self.ip.is_ipv4()
    }

    pub fn is_ipv6(&self) -> bool {
        self.ip.is_ipv6()
    }

    /// True for RFC1918 / loopback / link-local addresses, used to decide
    /// whether a connection counts as "local" for the filter predicates in
    /// spec §4.C/§4.E.
    pub fn is_local(&self) -> bool {
        match self.ip {
            IpAddr::V4(v4) => {
                v4.is_private() || v4.is_loopback() || v4.is_link_local()
            }
            IpAddr::V6(v6) => v6.is_loopback() || (v6.segments()[0] & 0xfe00) == 0xfc00,
        }
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn private_v4_is_local() {
        let addr = PeerAddress::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 5)), 3000);
        assert!(addr.is_local());
    }

    #[test]
    fn public_v4_is_not_local() {
        let addr = PeerAddress::new(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), 3000);
        assert!(!addr.is_local());
    }

    #[test]
    fn display_format() {
        let addr = PeerAddress::new(IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)), 42);
        assert_eq!(addr.to_string(), "1.2.3.4:42");
    }
}
