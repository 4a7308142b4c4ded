// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Per-record payloads: one record after another until the buffer ends.
//!
//! ```text
//! record := [id: u32 LE]?            if HAS_IDS
//!           [hash: 32 bytes]?        if HAS_HASHES
//!           [tags]?                  if HAS_TAGS
//!           [attributes]?            if HAS_ATTRIBUTES
//!
//! tags       := vli count, count * (vli tag_id, vli user)
//! attributes := vli key_count, key_count * (string key, vli value_count,
//!                                           value_count * (string value, vli user))
//! ```
//!
//! There is no record count, so the only way to know where records stop is
//! to run out of bytes. A record that ends mid-field is a truncation, never a
//! short final record.

use super::encoding::{encode_string, encode_vli, ByteReader};
use super::header::{ResponseFlags, HEADER_LEN};
use crate::error::ProtocolError;
use crate::types::{AttributeMap, ImageHash, ImageRecord, TagMap};

/// Smallest possible (tag_id, user) pair: two one-byte VLIs.
const MIN_TAG_ENTRY: usize = 2;
/// Smallest possible attribute key: empty string + zero value count.
const MIN_KEY_ENTRY: usize = 2;
/// Smallest possible attribute value: empty string + one-byte user.
const MIN_VALUE_ENTRY: usize = 2;

// ============================================================================
// DECODING
// ============================================================================

/// Lazy iterator over the records of a per-record payload.
///
/// Yields `Err` at most once, then stops. Offsets in errors are relative to
/// the start of the full response (header included).
#[derive(Debug, Clone)]
pub struct ImageRecords<'a> {
    reader: ByteReader<'a>,
    flags: ResponseFlags,
    failed: bool,
}

impl<'a> ImageRecords<'a> {
    pub fn new(flags: ResponseFlags, payload: &'a [u8]) -> Self {
        Self {
            reader: ByteReader::with_base(payload, HEADER_LEN),
            flags,
            failed: false,
        }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.reader.remaining()
    }

    fn read_record(&mut self) -> Result<ImageRecord, ProtocolError> {
        let r = &mut self.reader;
        let mut record = ImageRecord::default();

        if self.flags.has_ids() {
            record.id = Some(r.read_u32_le()?);
        }
        if self.flags.has_hashes() {
            record.hash = Some(ImageHash(r.read_array()?));
        }
        if self.flags.has_tags() {
            record.tags = Some(read_tags(r)?);
        }
        if self.flags.has_attributes() {
            record.attributes = Some(read_attributes(r)?);
        }
        Ok(record)
    }
}

impl Iterator for ImageRecords<'_> {
    type Item = Result<ImageRecord, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.reader.is_exhausted() {
            return None;
        }
        if self.flags.is_empty() {
            // Nothing selected means every record is zero bytes long
            self.failed = true;
            return Some(Err(ProtocolError::malformed(
                self.reader.absolute_position(),
                format!(
                    "{} payload bytes but no fields selected",
                    self.reader.remaining()
                ),
            )));
        }
        let result = self.read_record();
        self.failed = result.is_err();
        Some(result)
    }
}

impl std::iter::FusedIterator for ImageRecords<'_> {}

fn read_tags(r: &mut ByteReader<'_>) -> Result<TagMap, ProtocolError> {
    let count = r.read_count(MIN_TAG_ENTRY)?;
    let mut tags = TagMap::new();
    for _ in 0..count {
        let tag = r.read_vli()?;
        let user = r.read_vli()?;
        tags.insert(tag, user);
    }
    Ok(tags)
}

fn read_attributes(r: &mut ByteReader<'_>) -> Result<AttributeMap, ProtocolError> {
    let key_count = r.read_count(MIN_KEY_ENTRY)?;
    let mut attributes = AttributeMap::new();
    for _ in 0..key_count {
        let key = r.read_string()?;
        let value_count = r.read_count(MIN_VALUE_ENTRY)?;
        // Repeated keys merge into one value map
        let values = attributes.entry(key).or_default();
        for _ in 0..value_count {
            let value = r.read_string()?;
            let user = r.read_vli()?;
            values.insert(value, user);
        }
    }
    Ok(attributes)
}

/// Decode every record in `payload`.
pub fn decode_image_records(
    flags: ResponseFlags,
    payload: &[u8],
) -> Result<Vec<ImageRecord>, ProtocolError> {
    ImageRecords::new(flags, payload).collect()
}

// ============================================================================
// ENCODING
// ============================================================================

/// Append `records` as a per-record payload selected by `flags`.
///
/// A selected field the record lacks is written as its empty value (id 0,
/// zero hash, empty map) so that every record has the same shape.
pub fn encode_image_records(flags: ResponseFlags, records: &[ImageRecord], buf: &mut Vec<u8>) {
    for record in records {
        if flags.has_ids() {
            buf.extend_from_slice(&record.id.unwrap_or(0).to_le_bytes());
        }
        if flags.has_hashes() {
            buf.extend_from_slice(record.hash.unwrap_or_default().as_bytes());
        }
        if flags.has_tags() {
            let tags = record.tags.as_ref();
            encode_vli(tags.map_or(0, TagMap::len) as u64, buf);
            for (tag, user) in tags.into_iter().flatten() {
                encode_vli(*tag, buf);
                encode_vli(*user, buf);
            }
        }
        if flags.has_attributes() {
            let attributes = record.attributes.as_ref();
            encode_vli(attributes.map_or(0, AttributeMap::len) as u64, buf);
            for (key, values) in attributes.into_iter().flatten() {
                encode_string(key, buf);
                encode_vli(values.len() as u64, buf);
                for (value, user) in values {
                    encode_string(value, buf);
                    encode_vli(*user, buf);
                }
            }
        }
    }
}
