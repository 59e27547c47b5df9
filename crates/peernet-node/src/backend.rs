//! The node's non-global handle (spec §9 "Backend")
//!
//! Bundles everything a running node needs: its identity, the peer list and
//! DHT table, the sequence registry, the bound sockets, and the
//! application-supplied collaborators (`BlockSource`/`ValueStore`). Nothing
//! here is a global/static — a process can run more than one `Backend`.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::net::UdpSocket;
use tracing::trace;

use peernet_codec::header;
use peernet_core::address::PeerAddress;
use peernet_core::identity::NodeId;
use peernet_core::packet::{Command, PacketRaw};
use peernet_core::traits::{BlockSource, BlockStatus, ValueStore};
use peernet_crypto::{envelope, Keypair};
use peernet_dht::RoutingTable;
use peernet_peerlist::{PeerInfo, Peerlist};
use peernet_routing::{SequenceRegistry, StoreIndex};
use peernet_transport::ReliableChannel;

use crate::config::PeernetConfig;
use crate::error::{NodeError, NodeResult};
use crate::keystore::Keystore;

/// A `ValueStore`/`BlockSource` that has nothing stored, used when an
/// embedding application doesn't plug in its own warehouse/blockchain.
pub struct NullStore;

#[async_trait]
impl ValueStore for NullStore {
    async fn get(&self, _hash: &[u8]) -> Option<Vec<u8>> {
        None
    }

    async fn size_of(&self, _hash: &[u8]) -> Option<usize> {
        None
    }
}

#[async_trait]
impl BlockSource for NullStore {
    async fn get_block_raw(&self, _n: u64) -> (Vec<u8>, BlockStatus) {
        (Vec::new(), BlockStatus::NotAvailable)
    }
}

/// One bound UDP socket, paired with the locally reachable address it
/// represents.
pub struct BoundSocket {
    pub socket: UdpSocket,
    pub local_address: PeerAddress,
}

/// The node's explicit, non-global state (spec §9). Every background task
/// and dispatch call takes a `&Backend` rather than reaching for a static.
pub struct Backend {
    pub config: PeernetConfig,
    pub identity: Keypair,
    pub peerlist: Peerlist,
    pub dht: RoutingTable<Arc<PeerInfo>>,
    pub sequences: SequenceRegistry,
    pub store_index: StoreIndex,
    pub value_store: Arc<dyn ValueStore>,
    pub block_source: Arc<dyn BlockSource>,
    pub socket_v4: Option<BoundSocket>,
    pub socket_v6: Option<BoundSocket>,
    /// Sequence-tagged reliable channels backing in-flight block transfers
    /// (spec §4.I). Keyed by the remote peer and the bidirectional sequence
    /// number the channel was registered under.
    pub virtual_conns: DashMap<(NodeId, u32), Arc<ReliableChannel>>,
}

impl Backend {
    /// Bind the configured sockets, load (or generate) the node identity,
    /// and assemble the backend. Collaborators default to [`NullStore`] when
    /// not supplied.
    pub async fn new(config: PeernetConfig) -> NodeResult<Self> {
        Self::with_collaborators(config, Arc::new(NullStore), Arc::new(NullStore)).await
    }

    pub async fn with_collaborators(
        config: PeernetConfig,
        value_store: Arc<dyn ValueStore>,
        block_source: Arc<dyn BlockSource>,
    ) -> NodeResult<Self> {
        let keystore = Keystore::new(&config.data_dir);
        let identity = keystore.load_or_generate()?;

        let socket_v4 = match config.listen_ipv4 {
            Some(addr) => Some(bind_socket(addr).await?),
            None => None,
        };
        let socket_v6 = match config.listen_ipv6 {
            Some(addr) => Some(bind_socket(addr).await?),
            None => None,
        };

        if socket_v4.is_none() && socket_v6.is_none() {
            return Err(NodeError::NoListenAddress);
        }

        let local_id = identity.node_id();

        Ok(Self {
            config,
            identity,
            peerlist: Peerlist::new(),
            dht: RoutingTable::new(local_id),
            sequences: SequenceRegistry::new(),
            store_index: StoreIndex::new(),
            value_store,
            block_source,
            socket_v4,
            socket_v6,
            virtual_conns: DashMap::new(),
        })
    }

    pub fn local_node_id(&self) -> NodeId {
        self.identity.node_id()
    }

    /// Preferred address to advertise for ourselves, used when answering a
    /// FIND_VALUE as the storing peer (spec §4.E step 5).
    pub fn local_record_address(&self) -> NodeResult<PeerAddress> {
        self.socket_v4
            .as_ref()
            .or(self.socket_v6.as_ref())
            .map(|bound| bound.local_address)
            .ok_or(NodeError::NoListenAddress)
    }

    pub fn register_virtual_conn(&self, remote: NodeId, sequence: u32, channel: Arc<ReliableChannel>) {
        self.virtual_conns.insert((remote, sequence), channel);
    }

    pub fn lookup_virtual_conn(&self, remote: &NodeId, sequence: u32) -> Option<Arc<ReliableChannel>> {
        self.virtual_conns.get(&(*remote, sequence)).map(|e| e.clone())
    }

    pub fn remove_virtual_conn(&self, remote: &NodeId, sequence: u32) {
        self.virtual_conns.remove(&(*remote, sequence));
    }

    /// Seal and send one packet to a raw address, picking the bound socket
    /// matching its address family.
    pub async fn send_raw(
        &self,
        addr: PeerAddress,
        command: Command,
        sequence: u32,
        payload: Vec<u8>,
    ) -> NodeResult<()> {
        let bound = if addr.is_ipv4() {
            self.socket_v4.as_ref()
        } else {
            self.socket_v6.as_ref()
        }
        .ok_or(NodeError::NoListenAddress)?;

        let wire = header::encode(&PacketRaw::new(command, sequence, payload));
        let sealed = envelope::seal(&self.identity, &wire);
        let dest: SocketAddr = (addr.ip, addr.port).into();
        bound.socket.send_to(&sealed, dest).await?;
        Ok(())
    }

    /// Send to a known peer: its shared active connection if it has one,
    /// otherwise every candidate `target_addresses` in turn (spec §9
    /// "Virtual peers" — outbound sends fan out across candidates until one
    /// replies).
    pub async fn send_to_peer(
        &self,
        peer: &Arc<PeerInfo>,
        command: Command,
        sequence: u32,
        payload: Vec<u8>,
    ) -> NodeResult<()> {
        if let Some(conn) = peer.connection_to_share(true, true, true) {
            return self.send_raw(conn.address, command, sequence, payload).await;
        }

        let targets = peer.target_addresses();
        if targets.is_empty() {
            trace!(peer = %peer.node_id, "no address to send to");
            return Err(NodeError::NoListenAddress);
        }
        for target in targets {
            if let Err(e) = self
                .send_raw(target, command, sequence, payload.clone())
                .await
            {
                trace!(peer = %peer.node_id, address = %target, error = %e, "hole-punch attempt failed");
            }
        }
        Ok(())
    }
}

async fn bind_socket(addr: SocketAddr) -> NodeResult<BoundSocket> {
    let socket = UdpSocket::bind(addr).await?;
    let bound_addr = socket.local_addr()?;
    Ok(BoundSocket {
        socket,
        local_address: PeerAddress::new(bound_addr.ip(), bound_addr.port()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_backend_generates_identity_and_binds_socket() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = PeernetConfig::default()
            .with_data_dir(dir.path())
            .with_listen_ipv4("127.0.0.1:0".parse().unwrap());

        let backend = Backend::new(config).await.unwrap();
        assert!(backend.socket_v4.is_some());
        assert!(backend.local_record_address().is_ok());
    }

    #[tokio::test]
    async fn new_backend_fails_with_no_listen_address() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = PeernetConfig::default().with_data_dir(dir.path());
        config.listen_ipv4 = None;
        config.listen_ipv6 = None;

        let err = Backend::new(config).await.unwrap_err();
        assert!(matches!(err, NodeError::NoListenAddress));
    }
}
