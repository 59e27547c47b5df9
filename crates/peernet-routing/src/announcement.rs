//! Announcement handling (spec §4.E)
//!
//! Turns an inbound [`MessageAnnouncement`] into the [`MessageResponse`] to
//! send back: closest contacts for FIND_SELF/FIND_PEER, embedded data or a
//! storing-peer advertisement for FIND_VALUE, and local bookkeeping for
//! INFO_STORE. Grounded line-for-line on `cmdAnouncement`/`peer2Record` in
//! `examples/original_source/Commands.go`.

use std::sync::Arc;

use dashmap::DashMap;

use peernet_codec::announcement::{Actions, MessageAnnouncement};
use peernet_codec::peer_record::PeerRecord;
use peernet_codec::response::{FileEmbed, Hash2Peer, MessageResponse};
use peernet_core::address::PeerAddress;
use peernet_core::identity::NodeId;
use peernet_core::traits::ValueStore;
use peernet_dht::RoutingTable;
use peernet_peerlist::PeerInfo;

/// Number of closest contacts returned per key (spec §4.E): enough to be
/// useful, small enough that a full response stays under typical path MTU
/// (`examples/original_source/Commands.go`'s `respondClosesContactsCount`
/// comment: "stay below 508 bytes").
pub const RESPOND_CLOSEST_CONTACTS_COUNT: usize = 5;

/// Values up to this size are embedded directly in the response rather than
/// answered with a storing-peer advertisement (spec §4.E step 5). The
/// original source decides this implicitly inside its storage layer; this
/// crate makes the threshold explicit since `ValueStore` is generic.
pub const MAX_EMBED_SIZE: usize = 400;

/// Tracks which file hashes the sender has advertised via INFO_STORE
/// (spec §4.E, "Information about files stored by the sender").
#[derive(Default)]
pub struct StoreIndex {
    index: DashMap<[u8; 32], Vec<NodeId>>,
}

impl StoreIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, hash: [u8; 32], holder: NodeId) {
        let mut holders = self.index.entry(hash).or_default();
        if !holders.contains(&holder) {
            holders.push(holder);
        }
    }

    pub fn holders(&self, hash: &[u8; 32]) -> Vec<NodeId> {
        self.index.get(hash).map(|e| e.clone()).unwrap_or_default()
    }
}

/// Everything `handle_announcement` needs to answer a request, bundled so
/// the call site in `peernet-node` doesn't have to thread five parameters
/// through by hand.
pub struct AnnouncementContext<'a> {
    pub dht: &'a RoutingTable<Arc<PeerInfo>>,
    pub value_store: &'a dyn ValueStore,
    pub store_index: &'a StoreIndex,
    pub local_public_key: peernet_crypto::PublicKey,
    pub local_record_address: PeerAddress,
}

/// Convert a DHT entry into a wire `PeerRecord`, or `None` if it has no
/// connection shareable under the requester's allowed address families
/// (`peer2Record` in the original source — such peers are simply omitted,
/// not reported as "not found").
fn peer_to_record(
    peer: &Arc<PeerInfo>,
    allow_local: bool,
    allow_ipv4: bool,
    allow_ipv6: bool,
) -> Option<PeerRecord> {
    let connection = peer.connection_to_share(allow_local, allow_ipv4, allow_ipv6)?;
    Some(PeerRecord::new(peer.public_key, connection.address))
}

fn peers_to_records(
    peers: impl IntoIterator<Item = (NodeId, Arc<PeerInfo>)>,
    allow_local: bool,
    allow_ipv4: bool,
    allow_ipv6: bool,
) -> Vec<PeerRecord> {
    peers
        .into_iter()
        .filter_map(|(_, peer)| peer_to_record(&peer, allow_local, allow_ipv4, allow_ipv6))
        .collect()
}

/// Handle one inbound Announcement and build the response to send back
/// (spec §4.E). `sender` is the already-resolved `PeerInfo` for whoever sent
/// `msg` — upserting a not-yet-known sender into the peerlist is
/// `peernet-node`'s job, since it owns the raw connection the message
/// arrived on.
pub async fn handle_announcement(
    ctx: &AnnouncementContext<'_>,
    sender: &Arc<PeerInfo>,
    connection_is_local: bool,
    msg: &MessageAnnouncement,
) -> MessageResponse {
    use peernet_core::identity::Features;

    let allow_ipv4 = msg.features.contains(Features::IPV4_LISTEN);
    let allow_ipv6 = msg.features.contains(Features::IPV6_LISTEN);

    let mut hash2peers = Vec::new();
    let mut hashes_not_found = Vec::new();
    let mut files_embed = Vec::new();

    // FIND_SELF: contacts close to the sender, excluding the sender itself.
    if msg.actions.contains(Actions::FIND_SELF) {
        let closest = peers_to_records(
            ctx.dht.get_closest_contacts(
                RESPOND_CLOSEST_CONTACTS_COUNT,
                &sender.node_id,
                |info| info.is_connectable(connection_is_local, allow_ipv4, allow_ipv6),
                &[sender.node_id],
            ),
            connection_is_local,
            allow_ipv4,
            allow_ipv6,
        );

        if !closest.is_empty() {
            hash2peers.push(Hash2Peer {
                key: *sender.node_id.as_bytes(),
                closest,
                storing: vec![],
                is_last: true,
            });
        } else {
            hashes_not_found.push(*sender.node_id.as_bytes());
        }
    }

    // FIND_PEER: look up each requested key.
    if msg.actions.contains(Actions::FIND_PEER) {
        for key in &msg.find_peer_keys {
            let closest = peers_to_records(
                ctx.dht.get_closest_contacts(
                    RESPOND_CLOSEST_CONTACTS_COUNT,
                    key,
                    |info| info.is_connectable(connection_is_local, allow_ipv4, allow_ipv6),
                    &[],
                ),
                connection_is_local,
                allow_ipv4,
                allow_ipv6,
            );

            if !closest.is_empty() {
                hash2peers.push(Hash2Peer {
                    key: *key.as_bytes(),
                    closest,
                    storing: vec![],
                    is_last: true,
                });
            } else {
                hashes_not_found.push(*key.as_bytes());
            }
        }
    }

    // FIND_VALUE: embed small values directly, advertise ourselves as the
    // storing peer for large ones, otherwise report not found.
    if msg.actions.contains(Actions::FIND_VALUE) {
        for hash in &msg.find_data_keys {
            match ctx.value_store.size_of(hash).await {
                Some(size) if size <= MAX_EMBED_SIZE => {
                    if let Some(data) = ctx.value_store.get(hash).await {
                        files_embed.push(FileEmbed { hash: *hash, data });
                    } else {
                        hashes_not_found.push(*hash);
                    }
                }
                Some(_) => {
                    let storing =
                        PeerRecord::new(ctx.local_public_key, ctx.local_record_address);
                    hash2peers.push(Hash2Peer {
                        key: *hash,
                        closest: vec![],
                        storing: vec![storing],
                        is_last: true,
                    });
                }
                None => hashes_not_found.push(*hash),
            }
        }
    }

    // INFO_STORE: record what the sender says it stores.
    if msg.actions.contains(Actions::INFO_STORE) && !msg.info_store_files.is_empty() {
        for file in &msg.info_store_files {
            ctx.store_index.record(file.hash, sender.node_id);
        }
    }

    MessageResponse {
        hash2peers,
        files_embed,
        hashes_not_found,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use peernet_codec::announcement::InfoStoreFile;
    use peernet_core::identity::{Features, NODE_ID_LEN};
    use peernet_crypto::Keypair;
    use peernet_peerlist::{Connection, ConnectionStatus};
    use std::net::{IpAddr, Ipv4Addr};

    struct EmptyStore;

    #[async_trait]
    impl ValueStore for EmptyStore {
        async fn get(&self, _hash: &[u8]) -> Option<Vec<u8>> {
            None
        }
        async fn size_of(&self, _hash: &[u8]) -> Option<usize> {
            None
        }
    }

    fn addr(port: u16) -> PeerAddress {
        PeerAddress::new(IpAddr::V4(Ipv4Addr::new(198, 51, 100, 3)), port)
    }

    fn make_peer() -> Arc<PeerInfo> {
        let peer = Arc::new(PeerInfo::new(Keypair::generate().public(), Features::IPV4_LISTEN));
        peer.attach_connection(Connection::new(addr(4000), ConnectionStatus::Active));
        peer
    }

    #[tokio::test]
    async fn find_self_returns_not_found_when_dht_empty() {
        let sender = make_peer();
        let dht: RoutingTable<Arc<PeerInfo>> = RoutingTable::new(NodeId::from_bytes([0u8; NODE_ID_LEN]));
        let store_index = StoreIndex::new();
        let store = EmptyStore;

        let ctx = AnnouncementContext {
            dht: &dht,
            value_store: &store,
            store_index: &store_index,
            local_public_key: Keypair::generate().public(),
            local_record_address: addr(5000),
        };

        let msg = MessageAnnouncement {
            features: Features::IPV4_LISTEN,
            actions: Actions::FIND_SELF,
            find_peer_keys: vec![],
            find_data_keys: vec![],
            info_store_files: vec![],
        };

        let response = handle_announcement(&ctx, &sender, false, &msg).await;
        assert_eq!(response.hashes_not_found, vec![*sender.node_id.as_bytes()]);
        assert!(response.hash2peers.is_empty());
    }

    #[tokio::test]
    async fn info_store_records_into_store_index() {
        let sender = make_peer();
        let dht: RoutingTable<Arc<PeerInfo>> = RoutingTable::new(NodeId::from_bytes([0u8; NODE_ID_LEN]));
        let store_index = StoreIndex::new();
        let store = EmptyStore;

        let ctx = AnnouncementContext {
            dht: &dht,
            value_store: &store,
            store_index: &store_index,
            local_public_key: Keypair::generate().public(),
            local_record_address: addr(5000),
        };

        let msg = MessageAnnouncement {
            features: Features::IPV4_LISTEN,
            actions: Actions::INFO_STORE,
            find_peer_keys: vec![],
            find_data_keys: vec![],
            info_store_files: vec![InfoStoreFile {
                hash: [3u8; 32],
                size: 100,
            }],
        };

        handle_announcement(&ctx, &sender, false, &msg).await;
        assert_eq!(store_index.holders(&[3u8; 32]), vec![sender.node_id]);
    }
}
