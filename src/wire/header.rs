// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Search response header: 3 bytes of magic, 1 byte of flags.
//!
//! That's the whole header. There is no length field and no record count:
//! the payload runs to the end of the buffer, and the flags alone decide how
//! to read it. Which means the flag bits are the protocol. Get one wrong and
//! every byte after it is misread, so the masks live here and nowhere else.

use std::io::{self, Write};

use crate::error::ProtocolError;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Magic bytes: "TMS" in ASCII
pub const MAGIC: [u8; 3] = [0x54, 0x4D, 0x53];

/// Bytes before the payload starts (magic + flags)
pub const HEADER_LEN: usize = 4;

/// Stride of one id in the flat id list
pub const ID_STRIDE: usize = 4;

/// Stride of one hash in the flat hash list
pub const HASH_STRIDE: usize = 32;

// ============================================================================
// SECURITY LIMITS (prevent resource exhaustion from malicious input)
// ============================================================================

/// Maximum response size: 1 GiB. A full-catalogue id dump is ~4 bytes/image.
pub const MAX_RESPONSE_SIZE: usize = 1024 * 1024 * 1024;

/// Maximum length of a single tag name, attribute key, or attribute value
pub const MAX_STRING_LEN: usize = 1024 * 1024;

// ============================================================================
// FLAGS
// ============================================================================

/// Field-selection flags from the header byte.
///
/// Bits 4-7 are reserved and must be zero. A producer that sets them is
/// speaking a protocol we don't know, so we refuse rather than guess.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ResponseFlags(pub(crate) u8);

impl ResponseFlags {
    pub const HAS_IDS: u8 = 0b0000_1000;
    pub const HAS_HASHES: u8 = 0b0000_0100;
    pub const HAS_TAGS: u8 = 0b0000_0010;
    pub const HAS_ATTRIBUTES: u8 = 0b0000_0001;
    pub const RESERVED: u8 = 0b1111_0000;

    pub fn new() -> Self {
        Self(0)
    }

    /// Parse a flag byte, rejecting reserved bits.
    pub fn from_byte(byte: u8) -> Result<Self, ProtocolError> {
        if byte & Self::RESERVED != 0 {
            return Err(ProtocolError::MalformedHeader(format!(
                "reserved flag bits set: {:#010b}",
                byte
            )));
        }
        Ok(Self(byte))
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn with_ids(mut self) -> Self {
        self.0 |= Self::HAS_IDS;
        self
    }

    pub fn with_hashes(mut self) -> Self {
        self.0 |= Self::HAS_HASHES;
        self
    }

    pub fn with_tags(mut self) -> Self {
        self.0 |= Self::HAS_TAGS;
        self
    }

    pub fn with_attributes(mut self) -> Self {
        self.0 |= Self::HAS_ATTRIBUTES;
        self
    }

    pub fn has_ids(self) -> bool {
        self.0 & Self::HAS_IDS != 0
    }

    pub fn has_hashes(self) -> bool {
        self.0 & Self::HAS_HASHES != 0
    }

    pub fn has_tags(self) -> bool {
        self.0 & Self::HAS_TAGS != 0
    }

    pub fn has_attributes(self) -> bool {
        self.0 & Self::HAS_ATTRIBUTES != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Ids and nothing else: the payload is a bare u32 array.
    pub fn is_flat_ids(self) -> bool {
        self.0 == Self::HAS_IDS
    }

    /// Hashes and nothing else: the payload is a bare 32-byte array.
    pub fn is_flat_hashes(self) -> bool {
        self.0 == Self::HAS_HASHES
    }

    /// Human-readable field list, e.g. "ids|tags".
    pub fn describe(self) -> String {
        let names: Vec<&str> = [
            (self.has_ids(), "ids"),
            (self.has_hashes(), "hashes"),
            (self.has_tags(), "tags"),
            (self.has_attributes(), "attributes"),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .map(|(_, name)| *name)
        .collect();

        if names.is_empty() {
            "none".to_string()
        } else {
            names.join("|")
        }
    }
}

// ============================================================================
// HEADER
// ============================================================================

/// Parsed response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub flags: ResponseFlags,
}

impl ResponseHeader {
    pub const SIZE: usize = HEADER_LEN;

    pub fn new(flags: ResponseFlags) -> Self {
        Self { flags }
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&MAGIC)?;
        w.write_all(&[self.flags.0])?;
        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        [MAGIC[0], MAGIC[1], MAGIC[2], self.flags.0]
    }

    /// Parse the header from the front of `bytes`.
    ///
    /// Magic is checked before anything else; a mismatch consumes nothing
    /// further.
    pub fn read(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let magic = bytes.get(..MAGIC.len()).unwrap_or(bytes);
        if magic != MAGIC {
            return Err(ProtocolError::MalformedHeader(format!(
                "invalid magic: expected TMS, got {:?}",
                magic
            )));
        }

        let flag_byte = bytes.get(MAGIC.len()).copied().ok_or_else(|| {
            ProtocolError::MalformedHeader("response ends before flag byte".to_string())
        })?;

        let flags = ResponseFlags::from_byte(flag_byte)?;
        check_response_size(bytes.len())?;
        Ok(Self { flags })
    }
}

/// Reject responses over [`MAX_RESPONSE_SIZE`]. The header is fine; the
/// payload is what's too big, so the error points at the first byte past
/// the limit.
pub(crate) fn check_response_size(len: usize) -> Result<(), ProtocolError> {
    if len > MAX_RESPONSE_SIZE {
        return Err(ProtocolError::malformed(
            MAX_RESPONSE_SIZE,
            format!("response of {} bytes exceeds limit of {}", len, MAX_RESPONSE_SIZE),
        ));
    }
    Ok(())
}
