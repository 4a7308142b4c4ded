// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Search-result wire codec.
//!
//! The service has spoken two binary dialects over its life. The current one
//! is tiny: four bytes of header and a payload whose shape the flag byte alone
//! decides. The legacy one is a FlatBuffers table tree (see [`table`]). Both
//! decode to the same [`ResultVariant`], and both always store tags by id.
//!
//! The codec is pure and synchronous. It never retries, never logs above
//! `debug`, and never allocates more than the input could justify.
//!
//! # Flat generation
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │ HEADER (4 bytes)                                           │
//! │   magic: [u8; 3] = "TMS"                                   │
//! │   flags: u8 = 0000 I H T A                                 │
//! │     I (0b1000) ids      H (0b0100) hashes                  │
//! │     T (0b0010) tags     A (0b0001) attributes              │
//! ├────────────────────────────────────────────────────────────┤
//! │ PAYLOAD (runs to end of buffer)                            │
//! │   flags == I     : u32 LE * n              (IdList)        │
//! │   flags == H     : [u8; 32] * n            (HashList)      │
//! │   flags == 0     : empty                   (IdList([]))    │
//! │   anything else  : record * n              (ImageRecords)  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Record framing and the VLI integer format are in [`records`] and
//! [`encoding`].

pub mod encoding;
pub mod flat;
pub mod header;
pub mod records;
pub mod table;

pub use encoding::{decode_vli, encode_string, encode_vli, ByteReader, MAX_VLI_BYTES};
pub use flat::{decode_hash_list, decode_id_list, encode_hash_list, encode_id_list};
pub use header::{
    ResponseFlags, ResponseHeader, HASH_STRIDE, HEADER_LEN, ID_STRIDE, MAGIC, MAX_RESPONSE_SIZE,
    MAX_STRING_LEN,
};
pub use records::{decode_image_records, encode_image_records, ImageRecords};
pub use table::{decode_table, encode_table_response};

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::types::{ImageRecord, ResultVariant, TagDictionary};

/// Which on-wire generation a response is in.
///
/// Nothing in the bytes says which one you're holding (a table response
/// can start with anything), so the caller has to know.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// Magic + flag byte + payload
    #[default]
    Flat,
    /// Legacy FlatBuffers table tree
    Table,
}

impl std::fmt::Display for WireFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Flat => "flat",
            Self::Table => "table",
        })
    }
}

/// Decode a flat-generation search response.
pub fn decode(bytes: &[u8]) -> Result<ResultVariant, ProtocolError> {
    let header = ResponseHeader::read(bytes)?;
    let flags = header.flags;
    let payload = &bytes[HEADER_LEN..];

    let result = if flags.is_flat_ids() {
        ResultVariant::IdList(decode_id_list(payload)?)
    } else if flags.is_flat_hashes() {
        ResultVariant::HashList(decode_hash_list(payload)?)
    } else if flags.is_empty() && payload.is_empty() {
        ResultVariant::default()
    } else {
        ResultVariant::ImageRecordList(decode_image_records(flags, payload)?)
    };

    tracing::debug!(
        format = "flat",
        flags = %flags.describe(),
        kind = result.kind(),
        count = result.len(),
        bytes = bytes.len(),
        "decoded search response"
    );
    Ok(result)
}

/// Decode a response in the given generation.
///
/// `dict` is only consulted for [`WireFormat::Table`], which carries tag
/// names instead of ids.
pub fn decode_as(
    format: WireFormat,
    bytes: &[u8],
    dict: &TagDictionary,
) -> Result<ResultVariant, ProtocolError> {
    match format {
        WireFormat::Flat => decode(bytes),
        WireFormat::Table => {
            let result = decode_table(bytes, dict)?;
            tracing::debug!(
                format = "table",
                kind = result.kind(),
                count = result.len(),
                bytes = bytes.len(),
                "decoded search response"
            );
            Ok(result)
        }
    }
}

/// Flags that cover every field present in any of `records`.
pub fn flags_for_records(records: &[ImageRecord]) -> ResponseFlags {
    records.iter().fold(ResponseFlags::new(), |flags, r| {
        let mut flags = flags;
        if r.id.is_some() {
            flags = flags.with_ids();
        }
        if r.hash.is_some() {
            flags = flags.with_hashes();
        }
        if r.tags.is_some() {
            flags = flags.with_tags();
        }
        if r.attributes.is_some() {
            flags = flags.with_attributes();
        }
        flags
    })
}

/// Encode a result in the flat generation.
///
/// Record lists get the union of their records' fields as flags. A record
/// list whose only field is the id comes back from [`decode`] as an
/// `IdList`, since the two are the same bytes.
pub fn encode_response(result: &ResultVariant) -> Vec<u8> {
    match result {
        ResultVariant::IdList(ids) => {
            let flags = if ids.is_empty() {
                ResponseFlags::new()
            } else {
                ResponseFlags::new().with_ids()
            };
            let mut buf = ResponseHeader::new(flags).to_bytes().to_vec();
            encode_id_list(ids, &mut buf);
            buf
        }
        ResultVariant::HashList(hashes) => {
            let mut buf = ResponseHeader::new(ResponseFlags::new().with_hashes())
                .to_bytes()
                .to_vec();
            encode_hash_list(hashes, &mut buf);
            buf
        }
        ResultVariant::ImageRecordList(records) => {
            let flags = flags_for_records(records);
            let mut buf = ResponseHeader::new(flags).to_bytes().to_vec();
            encode_image_records(flags, records, &mut buf);
            buf
        }
    }
}

/// Encode a result in the given generation.
pub fn encode_as(
    format: WireFormat,
    result: &ResultVariant,
    dict: &TagDictionary,
) -> Result<Vec<u8>, ProtocolError> {
    match format {
        WireFormat::Flat => Ok(encode_response(result)),
        WireFormat::Table => encode_table_response(result, dict),
    }
}
