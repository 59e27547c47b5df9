//! `GetBlock`/`TransportControl` dispatch: wiring for the block-transfer
//! protocol (spec §4.I)
//!
//! A `RequestStart` control byte opens a new sender-side transfer: register
//! a [`ReliableChannel`] under the sequence number the requester chose and
//! stream blocks back over it. An `Active` control byte carries reliable-
//! channel frame bytes for an already-registered transfer, in either
//! direction, and is just routed to the matching channel's incoming queue.
//! Grounded on `startBlockTransfer` in
//! `examples/original_source/Transfer Block.go`.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, trace};

use peernet_codec::get_block::{BlockHeader, BlockRequestStart, Control, TargetRange};
use peernet_core::address::PeerAddress;
use peernet_core::identity::NodeId;
use peernet_core::packet::{Command, PacketRaw};
use peernet_crypto::PublicKey;
use peernet_peerlist::PeerInfo;
use peernet_routing::SequenceData;
use peernet_transport::{
    build_request_start, download_blocks, start_block_transfer, ReliableChannel, VirtualPacketConn,
};

use crate::backend::Backend;
use crate::error::{NodeError, NodeResult};

pub async fn handle_get_block(
    backend: &Arc<Backend>,
    sender_key: PublicKey,
    addr: PeerAddress,
    packet: &PacketRaw,
) -> NodeResult<()> {
    if packet.payload.is_empty() {
        trace!("dropped GetBlock: empty payload");
        return Ok(());
    }

    let control = match Control::from_u8(packet.payload[0]) {
        Ok(control) => control,
        Err(e) => {
            trace!(error = %e, "dropped GetBlock: bad control byte");
            return Ok(());
        }
    };
    let remote_id = sender_key.node_id();

    match control {
        Control::RequestStart => {
            let request = match BlockRequestStart::decode(&packet.payload[1..]) {
                Ok(request) => request,
                Err(e) => {
                    trace!(error = %e, "dropped GetBlock RequestStart: decode failed");
                    return Ok(());
                }
            };
            spawn_sender(backend, remote_id, addr, packet.sequence, request);
            Ok(())
        }
        Control::Active => {
            let Some(channel) = backend.lookup_virtual_conn(&remote_id, packet.sequence) else {
                debug!(peer = %remote_id, sequence = packet.sequence, "GetBlock Active for unknown channel");
                return Ok(());
            };
            channel
                .conn()
                .deliver_incoming(Bytes::copy_from_slice(&packet.payload[1..]));
            Ok(())
        }
    }
}

/// Spawn the sending side of a block transfer: wires a fresh
/// [`ReliableChannel`] whose outgoing frames go out as `GetBlock` `Active`
/// packets to `addr`, registers it under `sequence`, and runs
/// `start_block_transfer` to completion in the background.
fn spawn_sender(
    backend: &Arc<Backend>,
    remote_id: NodeId,
    addr: PeerAddress,
    sequence: u32,
    request: BlockRequestStart,
) {
    let dispatch_backend = backend.clone();
    let conn = VirtualPacketConn::new(sequence, move |frame_bytes: Bytes| {
        let backend = dispatch_backend.clone();
        let mut payload = Vec::with_capacity(1 + frame_bytes.len());
        payload.push(Control::Active as u8);
        payload.extend_from_slice(&frame_bytes);
        tokio::spawn(async move {
            if let Err(e) = backend.send_raw(addr, Command::GetBlock, sequence, payload).await {
                trace!(error = %e, "failed to send GetBlock Active frame");
            }
        });
    });

    let channel = Arc::new(ReliableChannel::new(conn));
    backend.register_virtual_conn(remote_id, sequence, channel.clone());

    let backend = backend.clone();
    tokio::spawn(async move {
        let result = start_block_transfer(
            &channel,
            backend.block_source.as_ref(),
            request.limit_block_count,
            request.max_block_size,
            &request.target_blocks,
        )
        .await;
        if let Err(e) = result {
            debug!(peer = %remote_id, error = %e, "block transfer sender failed");
        }
        channel.conn().terminate();
        backend.remove_virtual_conn(&remote_id, sequence);
    });
}

/// Requester role: open a new bidirectional sequence with `peer`, send the
/// `RequestStart`, and read back every requested block (spec §4.I
/// `BlockDownload`). Runs to completion before returning, since a caller
/// wanting overlap can run several of these concurrently.
pub async fn request_blocks(
    backend: &Arc<Backend>,
    peer: &Arc<PeerInfo>,
    blockchain_public_key: PublicKey,
    limit_block_count: u64,
    max_block_size: u64,
    target_blocks: Vec<TargetRange>,
) -> NodeResult<Vec<(BlockHeader, Vec<u8>)>> {
    let sequence = backend
        .sequences
        .new_sequence_bi(peer.node_id, SequenceData::Opaque(Arc::new(())));
    let sequence_number = sequence.sequence_number;

    let dispatch_backend = backend.clone();
    let dispatch_peer = peer.clone();
    let conn = VirtualPacketConn::new(sequence_number, move |frame_bytes: Bytes| {
        let backend = dispatch_backend.clone();
        let peer = dispatch_peer.clone();
        let mut payload = Vec::with_capacity(1 + frame_bytes.len());
        payload.push(Control::Active as u8);
        payload.extend_from_slice(&frame_bytes);
        tokio::spawn(async move {
            if let Err(e) = backend.send_to_peer(&peer, Command::GetBlock, sequence_number, payload).await {
                trace!(error = %e, "failed to send GetBlock Active frame");
            }
        });
    });

    let channel = Arc::new(ReliableChannel::new(conn));
    backend.register_virtual_conn(peer.node_id, sequence_number, channel.clone());

    // If the sequence sweeper reclaims this sequence before a reply ever
    // arrives, tear the channel down too so a reader blocked in
    // `download_blocks` is released instead of hanging forever (spec §4.H).
    let terminate_backend = backend.clone();
    let terminate_channel = channel.clone();
    let terminate_peer = peer.node_id;
    sequence.set_on_terminate(move || {
        terminate_channel.conn().terminate();
        terminate_backend.remove_virtual_conn(&terminate_peer, sequence_number);
    });

    let request =
        build_request_start(blockchain_public_key, limit_block_count, max_block_size, target_blocks.clone());
    let mut start_payload = vec![Control::RequestStart as u8];
    start_payload.extend_from_slice(&request.encode());
    backend
        .send_to_peer(peer, Command::GetBlock, sequence_number, start_payload)
        .await?;

    let mut results = Vec::new();
    let outcome = download_blocks(&channel, &target_blocks, |header, data| results.push((header, data))).await;

    backend.sequences.terminate(&peer.node_id, sequence_number, |_| {});
    channel.conn().terminate();
    backend.remove_virtual_conn(&peer.node_id, sequence_number);

    outcome.map_err(NodeError::Transport)?;
    Ok(results)
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use peernet_routing::{SequenceDirection, SequenceRegistry};
    use peernet_transport::VirtualPacketConn;

    use super::*;

    /// Scenario 5: a bidirectional block-transfer sequence that never gets a
    /// reply must be reclaimed by the sweeper, and a reader blocked on it
    /// must come back with an error rather than hang (spec §4.H, §5).
    #[tokio::test]
    async fn stalled_block_channel_is_unblocked_by_sequence_timeout() {
        let sequences = SequenceRegistry::new();
        let remote = NodeId::from_bytes([3u8; 32]);

        let conn = VirtualPacketConn::new(1, |_| {});
        let channel = Arc::new(ReliableChannel::new(conn));

        let sequence = sequences.register(
            remote,
            1,
            Duration::from_secs(0),
            SequenceDirection::Bidirectional,
            SequenceData::Opaque(Arc::new(())),
        );
        let terminate_channel = channel.clone();
        sequence.set_on_terminate(move || terminate_channel.conn().terminate());

        let reader_channel = channel.clone();
        let reader = tokio::spawn(async move { reader_channel.read_exact(4).await });

        tokio::task::yield_now().await;

        let expired = sequences.sweep_once(Instant::now() + Duration::from_millis(1));
        assert_eq!(expired, vec![(remote, 1)]);

        let result = reader.await.unwrap();
        assert!(result.is_err());
        assert!(channel.conn().is_terminated());
    }
}
