//! A single network path to a peer (spec §3 "Connection", §4.C)

use std::time::{Duration, Instant};

use peernet_core::address::PeerAddress;

/// How a connection counts toward the auto-ping thresholds (spec §4.C).
/// `Redundant` connections are kept (e.g. a second known path to an
/// already-reachable peer) but checked four times less aggressively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Active,
    Redundant,
}

/// Base thresholds for an `Active` connection (spec §5).
pub const PING_THRESHOLD: Duration = Duration::from_secs(10);
pub const INVALIDATE_THRESHOLD: Duration = Duration::from_secs(22);
pub const REMOVE_THRESHOLD: Duration = Duration::from_secs(120);
const REDUNDANT_MULTIPLIER: u32 = 4;

impl ConnectionStatus {
    pub fn ping_threshold(self) -> Duration {
        match self {
            ConnectionStatus::Active => PING_THRESHOLD,
            ConnectionStatus::Redundant => PING_THRESHOLD * REDUNDANT_MULTIPLIER,
        }
    }

    pub fn invalidate_threshold(self) -> Duration {
        match self {
            ConnectionStatus::Active => INVALIDATE_THRESHOLD,
            ConnectionStatus::Redundant => INVALIDATE_THRESHOLD * REDUNDANT_MULTIPLIER,
        }
    }

    pub fn remove_threshold(self) -> Duration {
        match self {
            ConnectionStatus::Active => REMOVE_THRESHOLD,
            ConnectionStatus::Redundant => REMOVE_THRESHOLD * REDUNDANT_MULTIPLIER,
        }
    }
}

/// A single path to a peer: an address plus the liveness bookkeeping the
/// auto-ping loop drives.
#[derive(Debug, Clone)]
pub struct Connection {
    pub address: PeerAddress,
    pub status: ConnectionStatus,
    pub last_packet_in: Instant,
    pub last_ping_out: Option<Instant>,
    /// Set when this connection was learned via a Traverse-relayed
    /// Announcement rather than a direct packet (spec §4.G Receive role).
    pub is_virtual: bool,
}

impl Connection {
    pub fn new(address: PeerAddress, status: ConnectionStatus) -> Self {
        Self {
            address,
            status,
            last_packet_in: Instant::now(),
            last_ping_out: None,
            is_virtual: false,
        }
    }

    pub fn touch_received(&mut self) {
        self.last_packet_in = Instant::now();
    }

    pub fn touch_ping_sent(&mut self) {
        self.last_ping_out = Some(Instant::now());
    }

    pub fn is_stale_for_invalidate(&self, now: Instant) -> bool {
        now.duration_since(self.last_packet_in) >= self.status.invalidate_threshold()
    }

    pub fn is_expired_for_remove(&self, now: Instant) -> bool {
        now.duration_since(self.last_packet_in) >= self.status.remove_threshold()
    }

    /// Whether this connection matches a classifier predicate used to decide
    /// if it may be shared with another peer (spec §4.C
    /// `GetConnection2Share`/`IsConnectable`).
    pub fn matches(&self, allow_local: bool, allow_ipv4: bool, allow_ipv6: bool) -> bool {
        if self.address.is_local() && !allow_local {
            return false;
        }
        if self.address.is_ipv4() && !allow_ipv4 {
            return false;
        }
        if self.address.is_ipv6() && !allow_ipv6 {
            return false;
        }
        true
    }

    fn due_for_ping(&self, now: Instant) -> bool {
        let threshold = self.status.ping_threshold();
        let in_stale = now.duration_since(self.last_packet_in) >= threshold;
        let not_recently_pinged = self
            .last_ping_out
            .map(|t| now.duration_since(t) >= threshold)
            .unwrap_or(true);
        in_stale && not_recently_pinged
    }

    pub fn due_for_ping_now(&self) -> bool {
        self.due_for_ping(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr() -> PeerAddress {
        PeerAddress::new(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 1)), 3000)
    }

    #[test]
    fn redundant_multiplies_thresholds() {
        assert_eq!(
            ConnectionStatus::Redundant.ping_threshold(),
            ConnectionStatus::Active.ping_threshold() * 4
        );
        assert_eq!(
            ConnectionStatus::Redundant.invalidate_threshold(),
            ConnectionStatus::Active.invalidate_threshold() * 4
        );
    }

    #[test]
    fn matches_rejects_disallowed_family() {
        let conn = Connection::new(addr(), ConnectionStatus::Active);
        assert!(conn.matches(true, true, true));
        assert!(!conn.matches(true, false, true));
    }

    #[test]
    fn matches_rejects_local_when_disallowed() {
        let local = PeerAddress::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)), 3000);
        let conn = Connection::new(local, ConnectionStatus::Active);
        assert!(!conn.matches(false, true, true));
        assert!(conn.matches(true, true, true));
    }

    #[test]
    fn fresh_connection_not_due_for_ping() {
        let conn = Connection::new(addr(), ConnectionStatus::Active);
        assert!(!conn.due_for_ping_now());
    }
}
