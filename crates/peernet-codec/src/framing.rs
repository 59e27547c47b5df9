//! Small shared helpers for the length-prefixed lists and blobs used by the
//! Announcement/Response/Traverse payloads. None of these shapes are
//! normative on their own (unlike [`crate::peer_record`]); they follow the
//! teacher's convention of a `u16` count or length prefix ahead of
//! variable-size data.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{CodecError, CodecResult};

/// A content-addressed hash: BLAKE3-256 digest of file or block data.
pub type Hash32 = [u8; 32];

pub fn put_hash(buf: &mut BytesMut, hash: &Hash32) {
    buf.put_slice(hash);
}

pub fn get_hash(bytes: &mut &[u8]) -> CodecResult<Hash32> {
    if bytes.remaining() < 32 {
        return Err(CodecError::Truncated);
    }
    let mut out = [0u8; 32];
    bytes.copy_to_slice(&mut out);
    Ok(out)
}

pub fn put_bytes_u16(buf: &mut BytesMut, data: &[u8]) {
    buf.put_u16(data.len() as u16);
    buf.put_slice(data);
}

pub fn get_bytes_u16(bytes: &mut &[u8]) -> CodecResult<Vec<u8>> {
    if bytes.remaining() < 2 {
        return Err(CodecError::Truncated);
    }
    let len = bytes.get_u16() as usize;
    if bytes.remaining() < len {
        return Err(CodecError::Truncated);
    }
    let mut out = vec![0u8; len];
    bytes.copy_to_slice(&mut out);
    Ok(out)
}

pub fn put_bytes_u32(buf: &mut BytesMut, data: &[u8]) {
    buf.put_u32(data.len() as u32);
    buf.put_slice(data);
}

pub fn get_bytes_u32(bytes: &mut &[u8]) -> CodecResult<Vec<u8>> {
    if bytes.remaining() < 4 {
        return Err(CodecError::Truncated);
    }
    let len = bytes.get_u32() as usize;
    if bytes.remaining() < len {
        return Err(CodecError::Truncated);
    }
    let mut out = vec![0u8; len];
    bytes.copy_to_slice(&mut out);
    Ok(out)
}

pub fn require(bytes: &&[u8], len: usize) -> CodecResult<()> {
    if bytes.remaining() < len {
        Err(CodecError::Truncated)
    } else {
        Ok(())
    }
}
