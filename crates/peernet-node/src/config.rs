//! Configuration for a Peernet node (spec §1 AMBIENT, §5).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use peernet_peerlist::connection::{INVALIDATE_THRESHOLD, PING_THRESHOLD, REMOVE_THRESHOLD};
use peernet_routing::sequence::DEFAULT_SEQUENCE_TIMEOUT;

/// Fragment size used when no explicit size is requested of the Merkle
/// fragment tree (spec §4.J leaves this to the implementer).
pub const DEFAULT_FRAGMENT_SIZE: u64 = 32 * 1024;

/// Configuration for a [`crate::backend::Backend`].
#[derive(Debug, Clone)]
pub struct PeernetConfig {
    /// Base directory for node data (keystore file, …).
    pub data_dir: PathBuf,
    /// IPv4 address to bind the UDP socket to, if any.
    pub listen_ipv4: Option<SocketAddr>,
    /// IPv6 address to bind the UDP socket to, if any.
    pub listen_ipv6: Option<SocketAddr>,
    /// Auto-ping threshold for an `Active` connection (spec §5).
    pub ping_threshold: Duration,
    /// Invalidate threshold for an `Active` connection (spec §5).
    pub invalidate_threshold: Duration,
    /// Remove threshold for an `Active` connection (spec §5).
    pub remove_threshold: Duration,
    /// Default timeout for a registered [`peernet_routing::Sequence`].
    pub sequence_timeout: Duration,
    /// Default fragment size for the Merkle fragment tree.
    pub fragment_size: u64,
}

impl Default for PeernetConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./peernet-data"),
            listen_ipv4: Some("0.0.0.0:0".parse().unwrap()),
            listen_ipv6: None,
            ping_threshold: PING_THRESHOLD,
            invalidate_threshold: INVALIDATE_THRESHOLD,
            remove_threshold: REMOVE_THRESHOLD,
            sequence_timeout: DEFAULT_SEQUENCE_TIMEOUT,
            fragment_size: DEFAULT_FRAGMENT_SIZE,
        }
    }
}

impl PeernetConfig {
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn with_listen_ipv4(mut self, addr: SocketAddr) -> Self {
        self.listen_ipv4 = Some(addr);
        self
    }

    pub fn with_listen_ipv6(mut self, addr: SocketAddr) -> Self {
        self.listen_ipv6 = Some(addr);
        self
    }

    pub fn with_fragment_size(mut self, fragment_size: u64) -> Self {
        self.fragment_size = fragment_size;
        self
    }

    pub fn keystore_path(&self) -> PathBuf {
        self.data_dir.join("identity.key")
    }
}
