//! `MessageAnnouncement` payload (spec §4.E, §6)

use bytes::{Buf, BufMut, Bytes, BytesMut};

use peernet_core::identity::{Features, NodeId, NODE_ID_LEN};

use crate::error::{CodecError, CodecResult};
use crate::framing::{self, Hash32};

/// Bits of the Announcement actions bitmask (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Actions(pub u8);

impl Actions {
    pub const FIND_SELF: Actions = Actions(1 << 0);
    pub const FIND_PEER: Actions = Actions(1 << 1);
    pub const FIND_VALUE: Actions = Actions(1 << 2);
    pub const INFO_STORE: Actions = Actions(1 << 3);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for Actions {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A file this peer is advertising it stores, for the InfoStore action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoStoreFile {
    pub hash: Hash32,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAnnouncement {
    pub features: Features,
    pub actions: Actions,
    /// Keys to resolve for the FindPeer action.
    pub find_peer_keys: Vec<NodeId>,
    /// Content hashes to resolve for the FindValue action.
    pub find_data_keys: Vec<Hash32>,
    /// Files advertised by the sender for the InfoStore action.
    pub info_store_files: Vec<InfoStoreFile>,
}

impl MessageAnnouncement {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u32(self.features.bits());
        buf.put_u8(self.actions.0);

        buf.put_u16(self.find_peer_keys.len() as u16);
        for key in &self.find_peer_keys {
            buf.put_slice(key.as_bytes());
        }

        buf.put_u16(self.find_data_keys.len() as u16);
        for key in &self.find_data_keys {
            framing::put_hash(&mut buf, key);
        }

        buf.put_u16(self.info_store_files.len() as u16);
        for file in &self.info_store_files {
            framing::put_hash(&mut buf, &file.hash);
            buf.put_u64(file.size);
        }

        buf.freeze()
    }

    pub fn decode(mut bytes: &[u8]) -> CodecResult<Self> {
        if bytes.remaining() < 5 {
            return Err(CodecError::Truncated);
        }
        let features = Features::from_bits(bytes.get_u32());
        let actions = Actions(bytes.get_u8());

        let find_peer_count = read_u16(&mut bytes)?;
        let mut find_peer_keys = Vec::with_capacity(find_peer_count);
        for _ in 0..find_peer_count {
            if bytes.remaining() < NODE_ID_LEN {
                return Err(CodecError::Truncated);
            }
            let mut id = [0u8; NODE_ID_LEN];
            bytes.copy_to_slice(&mut id);
            find_peer_keys.push(NodeId::from_bytes(id));
        }

        let find_data_count = read_u16(&mut bytes)?;
        let mut find_data_keys = Vec::with_capacity(find_data_count);
        for _ in 0..find_data_count {
            find_data_keys.push(framing::get_hash(&mut bytes)?);
        }

        let info_store_count = read_u16(&mut bytes)?;
        let mut info_store_files = Vec::with_capacity(info_store_count);
        for _ in 0..info_store_count {
            let hash = framing::get_hash(&mut bytes)?;
            if bytes.remaining() < 8 {
                return Err(CodecError::Truncated);
            }
            let size = bytes.get_u64();
            info_store_files.push(InfoStoreFile { hash, size });
        }

        Ok(MessageAnnouncement {
            features,
            actions,
            find_peer_keys,
            find_data_keys,
            info_store_files,
        })
    }
}

fn read_u16(bytes: &mut &[u8]) -> CodecResult<usize> {
    if bytes.remaining() < 2 {
        return Err(CodecError::Truncated);
    }
    Ok(bytes.get_u16() as usize)
}
