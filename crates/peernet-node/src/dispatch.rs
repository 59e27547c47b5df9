//! Inbound packet dispatch (spec §4, §7)
//!
//! One envelope-opened, header-decoded packet in, zero or more outbound
//! packets out. Grounded on `cmdAnouncement`/`cmdResponse`/`cmdPing`/
//! `cmdPong`/`cmdChat`/`cmdLocalDiscovery` in
//! `examples/original_source/Commands.go`. Protocol violations and stale
//! messages are dropped silently (spec §7.1) rather than surfaced as
//! errors: this module logs at `trace!`/`debug!`/`warn!` and returns
//! `Ok(())` for everything short of an outbound I/O failure.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, instrument, trace, warn};

use peernet_codec::announcement::{Actions, MessageAnnouncement};
use peernet_codec::header;
use peernet_codec::response::MessageResponse;
use peernet_codec::traverse::MessageTraverse;
use peernet_core::address::PeerAddress;
use peernet_core::identity::Features;
use peernet_core::packet::{Command, PacketRaw};
use peernet_crypto::{envelope, PublicKey};
use peernet_peerlist::{Connection, ConnectionStatus};
use peernet_routing::traverse::{forward, receive, ForwardContext, ReceiveContext};
use peernet_routing::{handle_announcement, AnnouncementContext, NodeMessage, SequenceData};

use crate::backend::Backend;
use crate::block;
use crate::error::NodeResult;

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Handle one inbound envelope received from `from`.
#[instrument(skip(backend, envelope), fields(from = %from))]
pub async fn dispatch(
    backend: &Arc<Backend>,
    from: std::net::SocketAddr,
    envelope: &[u8],
) -> NodeResult<()> {
    let (payload, sender_key) = match envelope::open(envelope, &backend.identity.public()) {
        Ok(opened) => opened,
        Err(e) => {
            trace!(error = %e, "dropped envelope: open failed");
            return Ok(());
        }
    };

    let packet = match header::decode(&payload) {
        Ok(packet) => packet,
        Err(e) => {
            trace!(error = %e, "dropped packet: header decode failed");
            return Ok(());
        }
    };

    let peer_address = PeerAddress::new(from.ip(), from.port());
    let connection_is_local = peer_address.is_local();

    match packet.command {
        Command::Announcement => {
            handle_announcement_cmd(backend, sender_key, peer_address, connection_is_local, &packet)
                .await
        }
        Command::Response => handle_response(backend, sender_key, peer_address, &packet).await,
        Command::Ping => handle_ping(backend, sender_key, peer_address, &packet).await,
        Command::Pong => Ok(()),
        Command::Chat => handle_chat(peer_address, &packet),
        Command::LocalDiscovery => {
            handle_local_discovery(backend, sender_key, peer_address, &packet).await
        }
        Command::Traverse => {
            handle_traverse(backend, sender_key, peer_address, connection_is_local, &packet).await
        }
        Command::GetBlock | Command::TransportControl => {
            block::handle_get_block(backend, sender_key, peer_address, &packet).await
        }
    }
}

/// Upsert the sender into the peerlist and DHT (`PeerlistAdd` in the
/// original source — every command handler does this on first contact;
/// repeat contacts just refresh liveness via `attach_connection`'s dedup).
fn upsert(
    backend: &Backend,
    sender_key: PublicKey,
    features: Features,
    addr: PeerAddress,
) -> Arc<peernet_peerlist::PeerInfo> {
    let (peer, was_new) = backend
        .peerlist
        .add(sender_key, features, Connection::new(addr, ConnectionStatus::Active));
    backend.dht.insert(peer.node_id, peer.clone());
    if was_new {
        debug!(peer = %peer.node_id, %addr, "new peer");
    }
    peer
}

async fn handle_announcement_cmd(
    backend: &Arc<Backend>,
    sender_key: PublicKey,
    addr: PeerAddress,
    connection_is_local: bool,
    packet: &PacketRaw,
) -> NodeResult<()> {
    let msg = match MessageAnnouncement::decode(&packet.payload) {
        Ok(msg) => msg,
        Err(e) => {
            trace!(error = %e, "dropped announcement: decode failed");
            return Ok(());
        }
    };

    let peer = upsert(backend, sender_key, msg.features, addr);

    let ctx = AnnouncementContext {
        dht: &backend.dht,
        value_store: backend.value_store.as_ref(),
        store_index: &backend.store_index,
        local_public_key: backend.identity.public(),
        local_record_address: backend.local_record_address()?,
    };
    let response = handle_announcement(&ctx, &peer, connection_is_local, &msg).await;
    backend
        .send_to_peer(&peer, Command::Response, packet.sequence, response.encode().to_vec())
        .await
}

async fn handle_response(
    backend: &Arc<Backend>,
    sender_key: PublicKey,
    addr: PeerAddress,
    packet: &PacketRaw,
) -> NodeResult<()> {
    let response = match MessageResponse::decode(&packet.payload) {
        Ok(response) => response,
        Err(e) => {
            trace!(error = %e, "dropped response: decode failed");
            return Ok(());
        }
    };

    let peer = upsert(backend, sender_key, Features::empty(), addr);
    let remote_id = peer.node_id;
    let local_node_id = backend.local_node_id();

    let Some(sequence) = backend.sequences.lookup(&remote_id, packet.sequence) else {
        if !response.hashes_not_found.is_empty()
            || !response.hash2peers.is_empty()
            || !response.files_embed.is_empty()
        {
            debug!(peer = %remote_id, sequence = packet.sequence, "unsolicited response data received");
        }
        return Ok(());
    };

    match &sequence.data {
        SequenceData::BootstrapFindSelf => {
            for hash2peer in &response.hash2peers {
                if hash2peer.key != *local_node_id.as_bytes() || hash2peer.closest.is_empty() {
                    warn!(peer = %remote_id, "bootstrap FIND_SELF response contains invalid data");
                    continue;
                }
                for record in &hash2peer.closest {
                    let contact =
                        backend
                            .peerlist
                            .add_virtual(record.public_key, Features::empty(), vec![record.address]);
                    backend.dht.insert(contact.node_id, contact);
                }
            }
            backend.sequences.terminate(&remote_id, packet.sequence, |_| {});
        }
        SequenceData::InformationRequest(ir) => {
            if !response.hashes_not_found.is_empty() {
                ir.done();
            }
            if !response.hash2peers.is_empty() || !response.files_embed.is_empty() {
                let mut closest = Vec::new();
                let mut storing = Vec::new();
                for hash2peer in &response.hash2peers {
                    closest.extend(hash2peer.closest.iter().cloned());
                    storing.extend(hash2peer.storing.iter().cloned());
                }
                let data = response.files_embed.first().map(|file| file.data.clone());
                ir.forward(NodeMessage {
                    sender_id: remote_id,
                    closest,
                    storing,
                    data,
                });
                if !response.files_embed.is_empty() {
                    ir.terminate();
                }
            }
            backend.sequences.terminate(&remote_id, packet.sequence, |_| {});
        }
        SequenceData::Opaque(_) => {
            trace!(peer = %remote_id, "ignoring opaque sequence data on Response command");
        }
    }

    Ok(())
}

async fn handle_ping(
    backend: &Arc<Backend>,
    sender_key: PublicKey,
    addr: PeerAddress,
    packet: &PacketRaw,
) -> NodeResult<()> {
    let was_known = backend.peerlist.lookup(&sender_key).is_some();
    let peer = upsert(backend, sender_key, Features::empty(), addr);

    if !was_known {
        // For security reasons the remote peer is not asked for FIND_SELF
        // here; this only re-establishes that we know each other.
        let msg = MessageAnnouncement {
            features: Features::empty(),
            actions: Actions::empty(),
            find_peer_keys: vec![],
            find_data_keys: vec![],
            info_store_files: vec![],
        };
        if let Err(e) = backend
            .send_to_peer(&peer, Command::Announcement, rand::random(), msg.encode().to_vec())
            .await
        {
            trace!(peer = %peer.node_id, error = %e, "defensive announcement on ping failed");
        }
    }

    backend
        .send_to_peer(&peer, Command::Pong, packet.sequence, Vec::new())
        .await
}

fn handle_chat(addr: PeerAddress, packet: &PacketRaw) -> NodeResult<()> {
    let text = String::from_utf8_lossy(&packet.payload);
    info!(from = %addr, message = %text, "chat");
    Ok(())
}

async fn handle_local_discovery(
    backend: &Arc<Backend>,
    sender_key: PublicKey,
    addr: PeerAddress,
    packet: &PacketRaw,
) -> NodeResult<()> {
    let msg = match MessageAnnouncement::decode(&packet.payload) {
        Ok(msg) => msg,
        Err(e) => {
            trace!(error = %e, "dropped local discovery: decode failed");
            return Ok(());
        }
    };

    let peer = upsert(backend, sender_key, msg.features, addr);
    send_bootstrap_find_self(backend, &peer).await
}

async fn send_bootstrap_find_self(
    backend: &Arc<Backend>,
    peer: &Arc<peernet_peerlist::PeerInfo>,
) -> NodeResult<()> {
    let sequence = backend
        .sequences
        .new_sequence_bi(peer.node_id, SequenceData::BootstrapFindSelf);
    let msg = MessageAnnouncement {
        features: Features::empty(),
        actions: Actions::FIND_SELF,
        find_peer_keys: vec![],
        find_data_keys: vec![],
        info_store_files: vec![],
    };
    backend
        .send_to_peer(peer, Command::Announcement, sequence.sequence_number, msg.encode().to_vec())
        .await
}

async fn handle_traverse(
    backend: &Arc<Backend>,
    sender_key: PublicKey,
    _addr: PeerAddress,
    connection_is_local: bool,
    packet: &PacketRaw,
) -> NodeResult<()> {
    let msg = match MessageTraverse::decode(&packet.payload) {
        Ok(msg) => msg,
        Err(e) => {
            trace!(error = %e, "dropped traverse: decode failed");
            return Ok(());
        }
    };

    if msg.target_peer.node_id() == backend.local_node_id() {
        let ctx = ReceiveContext {
            peerlist: &backend.peerlist,
            local_public_key: backend.identity.public(),
        };
        let outcome = match receive(&ctx, now_unix(), &msg) {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(error = %e, "dropped traverse: receive rejected");
                return Ok(());
            }
        };

        backend.dht.insert(outcome.virtual_peer.node_id, outcome.virtual_peer.clone());

        let ctx = AnnouncementContext {
            dht: &backend.dht,
            value_store: backend.value_store.as_ref(),
            store_index: &backend.store_index,
            local_public_key: backend.identity.public(),
            local_record_address: backend.local_record_address()?,
        };
        let response =
            handle_announcement(&ctx, &outcome.virtual_peer, false, &outcome.embedded_announcement)
                .await;
        backend
            .send_to_peer(
                &outcome.virtual_peer,
                Command::Response,
                outcome.embedded_sequence,
                response.encode().to_vec(),
            )
            .await
    } else {
        let ctx = ForwardContext {
            peerlist: &backend.peerlist,
        };
        let rewritten = match forward(&ctx, &sender_key, connection_is_local, now_unix(), &msg) {
            Ok(rewritten) => rewritten,
            Err(e) => {
                debug!(error = %e, "dropped traverse: forward rejected");
                return Ok(());
            }
        };

        let Some(target) = backend.peerlist.lookup_by_node_id(&msg.target_peer.node_id()) else {
            return Ok(());
        };
        backend
            .send_to_peer(&target, Command::Traverse, packet.sequence, rewritten.encode().to_vec())
            .await
    }
}
