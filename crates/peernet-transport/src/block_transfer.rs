//! Block-transfer protocol over a [`ReliableChannel`] (spec §4.I)
//!
//! Grounded directly on `startBlockTransfer` / `BlockTransferRequest` /
//! `BlockDownload` in `examples/original_source/Transfer Block.go`: the
//! sender streams a `BlockHeader` followed by the block's raw bytes for
//! every requested block number, in range order, honoring
//! `LimitBlockCount`/`MaxBlockSize`; the requester reads the same framing
//! back and rejects any header whose range wasn't asked for.

use peernet_codec::get_block::{BlockHeader, BlockRequestStart, BlockTransferStatus, TargetRange};
use peernet_core::traits::{BlockSource, BlockStatus};

use crate::error::{TransportError, TransportResult};
use crate::reliable::ReliableChannel;

/// Timeout for a follow-up block-transfer message before the session is
/// abandoned (spec §4.I, `blockSequenceTimeout` in the original source).
pub const BLOCK_SEQUENCE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Build the requester's opening `BlockRequestStart` payload. Sending it as
/// a `GetBlock` `RequestStart` packet and registering the bidirectional
/// sequence is `peernet-node`'s job, since it owns the socket and the
/// sequence registry.
pub fn build_request_start(
    blockchain_public_key: peernet_crypto::PublicKey,
    limit_block_count: u64,
    max_block_size: u64,
    target_blocks: Vec<TargetRange>,
) -> BlockRequestStart {
    BlockRequestStart {
        blockchain_public_key,
        limit_block_count,
        max_block_size,
        target_blocks,
    }
}

/// Sender role: stream every requested block, in range order, over
/// `channel`, honoring `limit_block_count`/`max_block_size` (spec §4.I
/// `startBlockTransfer`).
pub async fn start_block_transfer(
    channel: &ReliableChannel,
    source: &dyn BlockSource,
    limit_block_count: u64,
    max_block_size: u64,
    target_blocks: &[TargetRange],
) -> TransportResult<()> {
    let mut sent_blocks = 0u64;

    'outer: for target in target_blocks {
        for block_n in target.offset..(target.offset + target.limit) {
            let (data, status) = source.get_block_raw(block_n).await;

            if status != BlockStatus::Ok {
                write_header(
                    channel,
                    BlockHeader {
                        status: BlockTransferStatus::NotAvailable,
                        offset: block_n,
                        limit: 1,
                        block_size: 0,
                    },
                );
                continue;
            }

            let block_size = data.len() as u64;
            if block_size > max_block_size {
                write_header(
                    channel,
                    BlockHeader {
                        status: BlockTransferStatus::SizeExceed,
                        offset: block_n,
                        limit: 1,
                        block_size,
                    },
                );
                continue;
            }

            write_header(
                channel,
                BlockHeader {
                    status: BlockTransferStatus::Available,
                    offset: block_n,
                    limit: 1,
                    block_size,
                },
            );
            channel.write_all(&data);

            sent_blocks += 1;
            if sent_blocks >= limit_block_count {
                break 'outer;
            }
        }
    }

    Ok(())
}

fn write_header(channel: &ReliableChannel, header: BlockHeader) {
    channel.write_all(&header.encode());
}

/// Requester role: read back one `(header, data)` pair, validating the
/// returned range against what was requested (spec §4.I `isTargetInRange`).
pub async fn read_one_block(
    channel: &ReliableChannel,
    target_blocks: &[TargetRange],
) -> TransportResult<(BlockHeader, Vec<u8>)> {
    let header_bytes = channel.read_exact(peernet_codec::get_block::BLOCK_HEADER_LEN).await?;
    let header = BlockHeader::decode(&header_bytes)?;

    if !header.is_in_range(target_blocks) {
        return Err(TransportError::InvalidBlockRange);
    }

    let data = if header.status == BlockTransferStatus::Available {
        channel.read_exact(header.block_size as usize).await?
    } else {
        Vec::new()
    };

    Ok((header, data))
}

/// Requester role: read back every header the sender promised to send
/// (`sum(limit)` across `target_blocks`), calling `on_block` for each (spec
/// §4.I `BlockDownload`).
pub async fn download_blocks(
    channel: &ReliableChannel,
    target_blocks: &[TargetRange],
    mut on_block: impl FnMut(BlockHeader, Vec<u8>),
) -> TransportResult<()> {
    let total_limit: u64 = target_blocks.iter().map(|r| r.limit).sum();
    let mut received = 0u64;

    while received < total_limit {
        let (header, data) = read_one_block(channel, target_blocks).await?;
        received += header.limit;
        on_block(header, data);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_conn::VirtualPacketConn;
    use async_trait::async_trait;
    use peernet_crypto::Keypair;
    use std::sync::{Arc, Mutex};

    struct MemoryBlockSource {
        blocks: Vec<Vec<u8>>,
    }

    #[async_trait]
    impl BlockSource for MemoryBlockSource {
        async fn get_block_raw(&self, n: u64) -> (Vec<u8>, BlockStatus) {
            match self.blocks.get(n as usize) {
                Some(data) => (data.clone(), BlockStatus::Ok),
                None => (Vec::new(), BlockStatus::NotAvailable),
            }
        }
    }

    #[tokio::test]
    async fn start_block_transfer_writes_available_header_and_data() {
        let source = MemoryBlockSource {
            blocks: vec![b"block zero".to_vec()],
        };
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sent_clone = sent.clone();
        let conn = VirtualPacketConn::new(1, move |data| sent_clone.lock().unwrap().push(data));
        let sender_channel = ReliableChannel::new(conn);

        let targets = vec![TargetRange { offset: 0, limit: 1 }];
        start_block_transfer(&sender_channel, &source, 10, 1024, &targets)
            .await
            .unwrap();

        // header + data each produce at least one outgoing Segment frame.
        assert!(sent.lock().unwrap().len() >= 2);
    }

    #[tokio::test]
    async fn requester_rejects_header_outside_target_range() {
        let conn = VirtualPacketConn::new(1, |_| {});
        let channel = ReliableChannel::new(conn);

        let header = BlockHeader {
            status: BlockTransferStatus::Available,
            offset: 500,
            limit: 1,
            block_size: 4,
        };
        channel.handle_frame_for_test(crate::frame::Frame::Segment {
            packet_id: 0,
            data: header.encode().to_vec(),
        });

        let targets = vec![TargetRange { offset: 0, limit: 10 }];
        let err = read_one_block(&channel, &targets).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidBlockRange));
    }

    #[tokio::test]
    async fn full_round_trip_through_shared_frame_queue() {
        // End-to-end: write header+data into one channel's receive buffer
        // directly (the deliver_incoming path `peernet-node` would drive
        // from real packets) and read it back through `download_blocks`.
        let conn = VirtualPacketConn::new(7, |_| {});
        let channel = ReliableChannel::new(conn);

        let header = BlockHeader {
            status: BlockTransferStatus::Available,
            offset: 0,
            limit: 1,
            block_size: 5,
        };
        channel.handle_frame_for_test(crate::frame::Frame::Segment {
            packet_id: 0,
            data: header.encode().to_vec(),
        });
        channel.handle_frame_for_test(crate::frame::Frame::Segment {
            packet_id: 1,
            data: b"hello".to_vec(),
        });

        let targets = vec![TargetRange { offset: 0, limit: 1 }];
        let mut results = Vec::new();
        download_blocks(&channel, &targets, |h, d| results.push((h, d)))
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].1, b"hello");
    }

    #[test]
    fn build_request_start_carries_target_blocks() {
        let key = Keypair::generate().public();
        let targets = vec![TargetRange { offset: 0, limit: 5 }];
        let request = build_request_start(key, 5, 4096, targets.clone());
        assert_eq!(request.target_blocks, targets);
    }
}
