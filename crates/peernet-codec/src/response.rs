//! `MessageResponse` payload (spec §4.E/§4.F, §6)

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{CodecError, CodecResult};
use crate::framing::{self, Hash32};
use crate::peer_record::{PeerRecord, PEER_RECORD_LEN};

/// One key's worth of closest-contact / storing-peer results. `is_last`
/// tells the information-request orchestrator (spec §4.F) this is the final
/// entry for `key`, so it can finalize that key's collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hash2Peer {
    pub key: Hash32,
    pub closest: Vec<PeerRecord>,
    pub storing: Vec<PeerRecord>,
    pub is_last: bool,
}

/// A value small enough to embed directly rather than advertise a storing
/// peer for (spec §4.E step 5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEmbed {
    pub hash: Hash32,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageResponse {
    pub hash2peers: Vec<Hash2Peer>,
    pub files_embed: Vec<FileEmbed>,
    pub hashes_not_found: Vec<Hash32>,
}

impl MessageResponse {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u16(self.hash2peers.len() as u16);
        buf.put_u16(self.files_embed.len() as u16);
        buf.put_u16(self.hashes_not_found.len() as u16);

        for entry in &self.hash2peers {
            framing::put_hash(&mut buf, &entry.key);
            buf.put_u16(entry.closest.len() as u16);
            for record in &entry.closest {
                buf.put_slice(&record.encode());
            }
            buf.put_u16(entry.storing.len() as u16);
            for record in &entry.storing {
                buf.put_slice(&record.encode());
            }
            buf.put_u8(entry.is_last as u8);
        }

        for file in &self.files_embed {
            framing::put_hash(&mut buf, &file.hash);
            framing::put_bytes_u32(&mut buf, &file.data);
        }

        for hash in &self.hashes_not_found {
            framing::put_hash(&mut buf, hash);
        }

        buf.freeze()
    }

    pub fn decode(mut bytes: &[u8]) -> CodecResult<Self> {
        if bytes.remaining() < 6 {
            return Err(CodecError::Truncated);
        }
        let hash2peers_count = bytes.get_u16() as usize;
        let files_embed_count = bytes.get_u16() as usize;
        let hashes_not_found_count = bytes.get_u16() as usize;

        let mut hash2peers = Vec::with_capacity(hash2peers_count);
        for _ in 0..hash2peers_count {
            let key = framing::get_hash(&mut bytes)?;
            let closest = decode_peer_records(&mut bytes)?;
            let storing = decode_peer_records(&mut bytes)?;
            if bytes.remaining() < 1 {
                return Err(CodecError::Truncated);
            }
            let is_last = bytes.get_u8() != 0;
            hash2peers.push(Hash2Peer {
                key,
                closest,
                storing,
                is_last,
            });
        }

        let mut files_embed = Vec::with_capacity(files_embed_count);
        for _ in 0..files_embed_count {
            let hash = framing::get_hash(&mut bytes)?;
            let data = framing::get_bytes_u32(&mut bytes)?;
            files_embed.push(FileEmbed { hash, data });
        }

        let mut hashes_not_found = Vec::with_capacity(hashes_not_found_count);
        for _ in 0..hashes_not_found_count {
            hashes_not_found.push(framing::get_hash(&mut bytes)?);
        }

        Ok(MessageResponse {
            hash2peers,
            files_embed,
            hashes_not_found,
        })
    }
}

fn decode_peer_records(bytes: &mut &[u8]) -> CodecResult<Vec<PeerRecord>> {
    if bytes.remaining() < 2 {
        return Err(CodecError::Truncated);
    }
    let count = bytes.get_u16() as usize;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        if bytes.remaining() < PEER_RECORD_LEN {
            return Err(CodecError::Truncated);
        }
        let mut raw = [0u8; PEER_RECORD_LEN];
        bytes.copy_to_slice(&mut raw);
        out.push(PeerRecord::decode(&raw)?);
    }
    Ok(out)
}
