// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Binary encoding primitives: variable-length integers, strings, and a
//! bounds-checked cursor.
//!
//! The VLI here is not LEB128. It's the prefix-byte scheme Bitcoin calls
//! CompactSize: one byte for values under 0xfd, otherwise a marker byte
//! followed by a fixed-width little-endian integer. Tag ids and blame user ids
//! are almost always small, so almost every count and id costs one byte.
//!
//! ```text
//! 0x00..=0xfc  value is the byte itself
//! 0xfd         u16 LE follows
//! 0xfe         u32 LE follows
//! 0xff         u64 LE follows
//! ```
//!
//! Decoders accept non-minimal encodings (e.g. `0xfd 0x05 0x00` for 5). The
//! producer never emits them, but they're unambiguous, so rejecting them buys
//! nothing.

use super::header::MAX_STRING_LEN;
use crate::error::ProtocolError;

/// Largest VLI on the wire: marker + u64
pub const MAX_VLI_BYTES: usize = 9;

const VLI_U16: u8 = 0xfd;
const VLI_U32: u8 = 0xfe;
const VLI_U64: u8 = 0xff;

// ============================================================================
// VLI ENCODING
// ============================================================================

/// Encode a VLI to bytes, always using the shortest form.
pub fn encode_vli(value: u64, buf: &mut Vec<u8>) {
    if value < u64::from(VLI_U16) {
        buf.push(value as u8);
    } else if value <= u64::from(u16::MAX) {
        buf.push(VLI_U16);
        buf.extend_from_slice(&(value as u16).to_le_bytes());
    } else if value <= u64::from(u32::MAX) {
        buf.push(VLI_U32);
        buf.extend_from_slice(&(value as u32).to_le_bytes());
    } else {
        buf.push(VLI_U64);
        buf.extend_from_slice(&value.to_le_bytes());
    }
}

/// Decode a VLI from the front of `bytes`, returning (value, bytes_consumed).
pub fn decode_vli(bytes: &[u8]) -> Result<(u64, usize), ProtocolError> {
    let mut reader = ByteReader::new(bytes);
    let value = reader.read_vli()?;
    Ok((value, reader.position()))
}

/// Encode a length-prefixed UTF-8 string.
pub fn encode_string(s: &str, buf: &mut Vec<u8>) {
    encode_vli(s.len() as u64, buf);
    buf.extend_from_slice(s.as_bytes());
}

// ============================================================================
// CURSOR
// ============================================================================

/// Single forward cursor over a payload.
///
/// Every read is bounds-checked and fails with `TruncatedPayload`. Offsets in
/// errors are absolute (relative to the whole response, not the payload) when
/// the reader was built with [`ByteReader::with_base`].
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self::with_base(bytes, 0)
    }

    /// Reader whose error offsets are shifted by `base`.
    pub fn with_base(bytes: &'a [u8], base: usize) -> Self {
        Self {
            bytes,
            pos: 0,
            base,
        }
    }

    /// Position relative to the start of this reader's slice.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Position relative to the start of the response.
    #[inline]
    pub fn absolute_position(&self) -> usize {
        self.base + self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Take the next `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        if n > self.remaining() {
            return Err(ProtocolError::truncated(
                self.absolute_position(),
                n,
                self.remaining(),
            ));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16, ProtocolError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, ProtocolError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64_le(&mut self) -> Result<u64, ProtocolError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_vli(&mut self) -> Result<u64, ProtocolError> {
        let marker = self.read_u8()?;
        Ok(match marker {
            VLI_U16 => u64::from(self.read_u16_le()?),
            VLI_U32 => u64::from(self.read_u32_le()?),
            VLI_U64 => self.read_u64_le()?,
            small => u64::from(small),
        })
    }

    /// Read a VLI count and check it against what the payload could hold.
    ///
    /// `min_entry_size` is the fewest bytes one entry can occupy. A count that
    /// can't possibly fit is a truncation, and we report it before allocating
    /// anything for it.
    pub fn read_count(&mut self, min_entry_size: usize) -> Result<usize, ProtocolError> {
        let at = self.absolute_position();
        let count = self.read_vli()?;
        let needed = (count as u128) * (min_entry_size as u128);
        if needed > self.remaining() as u128 {
            return Err(ProtocolError::truncated(
                at,
                usize::try_from(needed).unwrap_or(usize::MAX),
                self.remaining(),
            ));
        }
        Ok(count as usize)
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String, ProtocolError> {
        let at = self.absolute_position();
        let len = self.read_vli()?;
        if len > MAX_STRING_LEN as u64 {
            return Err(ProtocolError::malformed(
                at,
                format!("string length {} exceeds limit of {}", len, MAX_STRING_LEN),
            ));
        }
        let start = self.absolute_position();
        let bytes = self.take(len as usize)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|e| ProtocolError::malformed(start, format!("invalid UTF-8: {}", e)))
    }
}
