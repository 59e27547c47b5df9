//! `GetBlock` payloads (spec §4.I, §6)
//!
//! Two shapes share the `GetBlock` command: the requester's
//! [`BlockRequestStart`] (sent once, control byte `RequestStart`) and the
//! per-block [`BlockHeader`] the sender streams back over the reliable
//! channel (control byte `Active`, one header per block followed by its
//! bytes when `status == Available`).

use bytes::{Buf, BufMut, Bytes, BytesMut};

use peernet_crypto::PublicKey;

use crate::error::{CodecError, CodecResult};

/// `GetBlock` control byte (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Control {
    RequestStart = 0,
    Active = 1,
}

impl Control {
    pub fn from_u8(value: u8) -> CodecResult<Self> {
        match value {
            0 => Ok(Control::RequestStart),
            1 => Ok(Control::Active),
            _ => Err(CodecError::Malformed("unknown GetBlock control byte")),
        }
    }
}

/// Per-block status carried in a [`BlockHeader`] (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BlockTransferStatus {
    Available = 0,
    NotAvailable = 1,
    SizeExceed = 2,
}

impl BlockTransferStatus {
    pub fn from_u8(value: u8) -> CodecResult<Self> {
        match value {
            0 => Ok(BlockTransferStatus::Available),
            1 => Ok(BlockTransferStatus::NotAvailable),
            2 => Ok(BlockTransferStatus::SizeExceed),
            _ => Err(CodecError::Malformed("unknown block transfer status byte")),
        }
    }
}

/// One contiguous range of block numbers the requester wants, `[offset,
/// offset + limit)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetRange {
    pub offset: u64,
    pub limit: u64,
}

impl TargetRange {
    /// Whether `block_number` falls within this requested range, used by the
    /// requester to reject a returned block that doesn't match anything it
    /// asked for (spec §4.I, "returned block range must lie within some
    /// requested range").
    pub fn contains(&self, block_number: u64) -> bool {
        block_number >= self.offset && block_number < self.offset + self.limit
    }
}

/// The requester's opening message: `ControlRequestStart` carrying
/// `(BlockchainPublicKey, LimitBlockCount, MaxBlockSize, TargetBlocks[])`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRequestStart {
    pub blockchain_public_key: PublicKey,
    pub limit_block_count: u64,
    pub max_block_size: u64,
    pub target_blocks: Vec<TargetRange>,
}

impl BlockRequestStart {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u8(Control::RequestStart as u8);
        buf.put_slice(&self.blockchain_public_key.to_compressed());
        buf.put_u64(self.limit_block_count);
        buf.put_u64(self.max_block_size);
        buf.put_u16(self.target_blocks.len() as u16);
        for range in &self.target_blocks {
            buf.put_u64(range.offset);
            buf.put_u64(range.limit);
        }
        buf.freeze()
    }

    pub fn decode(mut bytes: &[u8]) -> CodecResult<Self> {
        if bytes.remaining() < 1 {
            return Err(CodecError::Truncated);
        }
        match Control::from_u8(bytes.get_u8())? {
            Control::RequestStart => {}
            Control::Active => return Err(CodecError::Malformed("expected RequestStart control")),
        }

        if bytes.remaining() < 33 {
            return Err(CodecError::Truncated);
        }
        let mut key_bytes = [0u8; 33];
        bytes.copy_to_slice(&mut key_bytes);
        let blockchain_public_key = PublicKey::from_compressed(&key_bytes)
            .map_err(|_| CodecError::Malformed("invalid blockchain public key"))?;

        if bytes.remaining() < 18 {
            return Err(CodecError::Truncated);
        }
        let limit_block_count = bytes.get_u64();
        let max_block_size = bytes.get_u64();
        let count = bytes.get_u16() as usize;

        let mut target_blocks = Vec::with_capacity(count);
        for _ in 0..count {
            if bytes.remaining() < 16 {
                return Err(CodecError::Truncated);
            }
            target_blocks.push(TargetRange {
                offset: bytes.get_u64(),
                limit: bytes.get_u64(),
            });
        }

        Ok(BlockRequestStart {
            blockchain_public_key,
            limit_block_count,
            max_block_size,
            target_blocks,
        })
    }

    /// Total header count the requester must read back: `sum(limit)` across
    /// all requested ranges (spec §4.I).
    pub fn expected_header_count(&self) -> u64 {
        self.target_blocks.iter().map(|r| r.limit).sum()
    }
}

/// One block's framing header: `(status, offset, limit, blockSize)`. When
/// `status == Available` this is immediately followed by `block_size` raw
/// bytes on the stream; the header itself never carries the block's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub status: BlockTransferStatus,
    pub offset: u64,
    pub limit: u64,
    pub block_size: u64,
}

pub const BLOCK_HEADER_LEN: usize = 1 + 8 + 8 + 8;

impl BlockHeader {
    pub fn encode(&self) -> [u8; BLOCK_HEADER_LEN] {
        let mut buf = BytesMut::with_capacity(BLOCK_HEADER_LEN);
        buf.put_u8(self.status as u8);
        buf.put_u64(self.offset);
        buf.put_u64(self.limit);
        buf.put_u64(self.block_size);
        let mut out = [0u8; BLOCK_HEADER_LEN];
        out.copy_from_slice(&buf);
        out
    }

    pub fn decode(mut bytes: &[u8]) -> CodecResult<Self> {
        if bytes.len() != BLOCK_HEADER_LEN {
            return Err(CodecError::Malformed("block header must be 25 bytes"));
        }
        let status = BlockTransferStatus::from_u8(bytes.get_u8())?;
        let offset = bytes.get_u64();
        let limit = bytes.get_u64();
        let block_size = bytes.get_u64();
        Ok(BlockHeader {
            status,
            offset,
            limit,
            block_size,
        })
    }

    /// Whether `offset` lies in any of the requester's target ranges, used
    /// to reject a reply that doesn't correspond to anything requested
    /// (spec §4.I, `isTargetInRange`).
    pub fn is_in_range(&self, ranges: &[TargetRange]) -> bool {
        ranges.iter().any(|r| r.contains(self.offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peernet_crypto::Keypair;

    #[test]
    fn request_start_roundtrip() {
        let req = BlockRequestStart {
            blockchain_public_key: Keypair::generate().public(),
            limit_block_count: 100,
            max_block_size: 65536,
            target_blocks: vec![TargetRange { offset: 0, limit: 10 }, TargetRange { offset: 50, limit: 5 }],
        };
        let decoded = BlockRequestStart::decode(&req.encode()).unwrap();
        assert_eq!(decoded, req);
        assert_eq!(decoded.expected_header_count(), 15);
    }

    #[test]
    fn block_header_roundtrip() {
        let header = BlockHeader {
            status: BlockTransferStatus::Available,
            offset: 5,
            limit: 1,
            block_size: 4096,
        };
        let decoded = BlockHeader::decode(&header.encode()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn header_length_is_25_bytes() {
        let header = BlockHeader {
            status: BlockTransferStatus::NotAvailable,
            offset: 0,
            limit: 0,
            block_size: 0,
        };
        assert_eq!(header.encode().len(), BLOCK_HEADER_LEN);
        assert_eq!(BLOCK_HEADER_LEN, 25);
    }

    #[test]
    fn is_in_range_checks_all_ranges() {
        let header = BlockHeader {
            status: BlockTransferStatus::Available,
            offset: 52,
            limit: 1,
            block_size: 10,
        };
        let ranges = vec![TargetRange { offset: 0, limit: 10 }, TargetRange { offset: 50, limit: 5 }];
        assert!(header.is_in_range(&ranges));

        let out_of_range = BlockHeader { offset: 100, ..header };
        assert!(!out_of_range.is_in_range(&ranges));
    }
}
