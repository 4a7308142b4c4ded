// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Fast path for single-field responses: bare arrays, no per-record framing.

use super::header::{HASH_STRIDE, HEADER_LEN, ID_STRIDE};
use crate::error::ProtocolError;
use crate::types::ImageHash;

/// Validate that `payload` is a whole number of `stride`-sized items.
fn check_stride(payload: &[u8], stride: usize) -> Result<(), ProtocolError> {
    let tail = payload.len() % stride;
    if tail != 0 {
        let whole = payload.len() - tail;
        return Err(ProtocolError::truncated(HEADER_LEN + whole, stride, tail));
    }
    Ok(())
}

/// Decode a flat little-endian u32 array.
pub fn decode_id_list(payload: &[u8]) -> Result<Vec<u32>, ProtocolError> {
    check_stride(payload, ID_STRIDE)?;
    Ok(payload
        .chunks_exact(ID_STRIDE)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Decode a flat array of 32-byte hashes.
pub fn decode_hash_list(payload: &[u8]) -> Result<Vec<ImageHash>, ProtocolError> {
    check_stride(payload, HASH_STRIDE)?;
    Ok(payload
        .chunks_exact(HASH_STRIDE)
        .map(|c| {
            let mut hash = [0u8; HASH_STRIDE];
            hash.copy_from_slice(c);
            ImageHash(hash)
        })
        .collect())
}

pub fn encode_id_list(ids: &[u32], buf: &mut Vec<u8>) {
    buf.reserve(ids.len() * ID_STRIDE);
    for id in ids {
        buf.extend_from_slice(&id.to_le_bytes());
    }
}

pub fn encode_hash_list(hashes: &[ImageHash], buf: &mut Vec<u8>) {
    buf.reserve(hashes.len() * HASH_STRIDE);
    for hash in hashes {
        buf.extend_from_slice(hash.as_bytes());
    }
}
