// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Legacy generation: FlatBuffers tables.
//!
//! Older deployments answer searches with a FlatBuffers `SearchResultResponse`
//! instead of the flat bitflag format. The schema lives in [`schema`]; this
//! module verifies the buffer, walks it into a [`ResultVariant`], and builds
//! responses with [`FlatBufferBuilder`].
//!
//! This generation carries tag *names*, so decoding needs a [`TagDictionary`].

mod schema;

use flatbuffers::{FlatBufferBuilder, InvalidFlatbuffer, VerifierOptions, WIPOffset};

use self::schema::{
    AttributeWithBlame, HashStruct, Image, SearchResultResponse, TagWithBlame, ATTR_KEY,
    ATTR_USER, ATTR_VALUE, IMAGE_ATTRIBUTES, IMAGE_HASH, IMAGE_ID, IMAGE_TAGS, LIST_ITEMS,
    RESPONSE_DATA, RESPONSE_DATA_TYPE, TAG_NAME, TAG_USER,
};
use super::header::{check_response_size, MAX_RESPONSE_SIZE, MAX_STRING_LEN};
use crate::error::ProtocolError;
use crate::types::{AttributeMap, ImageRecord, ResultVariant, TagDictionary, TagMap};

pub use self::schema::data_type;

// ============================================================================
// READING
// ============================================================================

fn verifier_options() -> VerifierOptions {
    VerifierOptions {
        max_apparent_size: MAX_RESPONSE_SIZE,
        ..VerifierOptions::default()
    }
}

/// Translate a verifier rejection into the codec's error, keeping its position.
fn verify_error(e: InvalidFlatbuffer, len: usize) -> ProtocolError {
    match &e {
        InvalidFlatbuffer::RangeOutOfBounds { range, .. } => ProtocolError::truncated(
            range.start,
            range.len(),
            len.saturating_sub(range.start),
        ),
        InvalidFlatbuffer::Utf8Error { range, .. }
        | InvalidFlatbuffer::MissingNullTerminator { range, .. } => {
            ProtocolError::malformed(range.start, e.to_string())
        }
        InvalidFlatbuffer::Unaligned { position, .. }
        | InvalidFlatbuffer::SignedOffsetOutOfBounds { position, .. } => {
            ProtocolError::malformed(*position, e.to_string())
        }
        _ => ProtocolError::malformed(0, e.to_string()),
    }
}

fn bounded_str(s: &str, at: usize) -> Result<String, ProtocolError> {
    if s.len() > MAX_STRING_LEN {
        return Err(ProtocolError::malformed(
            at,
            format!("string length {} exceeds limit of {}", s.len(), MAX_STRING_LEN),
        ));
    }
    Ok(s.to_owned())
}

fn decode_tag(tag: TagWithBlame<'_>, dict: &TagDictionary) -> Result<(u64, u64), ProtocolError> {
    let name = tag.tag();
    let id = dict.id(name).ok_or_else(|| {
        ProtocolError::malformed(tag.loc(), format!("unknown tag name {:?}", name))
    })?;
    Ok((id, u64::from(tag.user())))
}

fn decode_attribute(
    attr: AttributeWithBlame<'_>,
    attributes: &mut AttributeMap,
) -> Result<(), ProtocolError> {
    let key = bounded_str(attr.key(), attr.loc())?;
    let value = bounded_str(attr.value(), attr.loc())?;
    attributes
        .entry(key)
        .or_default()
        .insert(value, u64::from(attr.user()));
    Ok(())
}

fn decode_image(image: Image<'_>, dict: &TagDictionary) -> Result<ImageRecord, ProtocolError> {
    let tags = image
        .tags()
        .map(|tags| tags.iter().map(|tag| decode_tag(tag, dict)).collect::<Result<TagMap, _>>())
        .transpose()?;

    let attributes = match image.attributes() {
        None => None,
        Some(list) => {
            let mut attributes = AttributeMap::new();
            for attr in list.iter() {
                decode_attribute(attr, &mut attributes)?;
            }
            Some(attributes)
        }
    };

    Ok(ImageRecord {
        id: image.id(),
        hash: image.hash(),
        tags,
        attributes,
    })
}

/// Decode a legacy table-generation response.
///
/// The whole buffer goes through the FlatBuffers verifier before any field is
/// read. Tag names are resolved through `dict`; a name it doesn't know is
/// `MalformedPayload`. An absent union (`data_type` 0) decodes to an empty id
/// list, same as all-zero flags in the flat generation.
pub fn decode_table(bytes: &[u8], dict: &TagDictionary) -> Result<ResultVariant, ProtocolError> {
    check_response_size(bytes.len())?;
    let root = schema::verified_root(bytes, &verifier_options())
        .map_err(|e| verify_error(e, bytes.len()))?;

    let kind = root.data_type();
    let missing = || {
        ProtocolError::malformed(root.loc(), format!("response type {} without data", kind))
    };

    match kind {
        data_type::NONE => Ok(ResultVariant::default()),
        data_type::IDS => {
            let data = root.data_as_ids().ok_or_else(missing)?;
            Ok(ResultVariant::IdList(
                data.ids().map(|ids| ids.iter().collect()).unwrap_or_default(),
            ))
        }
        data_type::HASHES => {
            let data = root.data_as_hashes().ok_or_else(missing)?;
            Ok(ResultVariant::HashList(
                data.hashes()
                    .map(|hashes| hashes.iter().collect())
                    .unwrap_or_default(),
            ))
        }
        data_type::IMAGES => {
            let data = root.data_as_images().ok_or_else(missing)?;
            let images = match data.images() {
                Some(images) => images
                    .iter()
                    .map(|image| decode_image(image, dict))
                    .collect::<Result<_, _>>()?,
                None => Vec::new(),
            };
            Ok(ResultVariant::ImageRecordList(images))
        }
        other => Err(ProtocolError::MalformedHeader(format!(
            "unknown response type {}",
            other
        ))),
    }
}

// ============================================================================
// WRITING
// ============================================================================

type Built = WIPOffset<flatbuffers::TableFinishedWIPOffset>;

fn narrow_user(user: u64, what: &str) -> Result<u32, ProtocolError> {
    u32::try_from(user).map_err(|_| {
        ProtocolError::malformed(0, format!("{} user {} does not fit in u32", what, user))
    })
}

fn write_tags(
    fbb: &mut FlatBufferBuilder<'_>,
    tags: &TagMap,
    dict: &TagDictionary,
) -> Result<Vec<Built>, ProtocolError> {
    let mut entries = Vec::with_capacity(tags.len());
    for (tag, user) in tags {
        let name = dict
            .name(*tag)
            .ok_or_else(|| ProtocolError::malformed(0, format!("tag id {} has no name", tag)))?;
        let user = narrow_user(*user, "tag")?;
        let name = fbb.create_string(name);
        let start = fbb.start_table();
        fbb.push_slot_always(TAG_NAME, name);
        fbb.push_slot::<u32>(TAG_USER, user, 0);
        entries.push(fbb.end_table(start));
    }
    Ok(entries)
}

fn write_attributes(
    fbb: &mut FlatBufferBuilder<'_>,
    attributes: &AttributeMap,
) -> Result<Vec<Built>, ProtocolError> {
    let mut entries = Vec::new();
    for (key, values) in attributes {
        for (value, user) in values {
            let user = narrow_user(*user, "attribute")?;
            let key = fbb.create_string(key);
            let value = fbb.create_string(value);
            let start = fbb.start_table();
            fbb.push_slot_always(ATTR_KEY, key);
            fbb.push_slot_always(ATTR_VALUE, value);
            fbb.push_slot::<u32>(ATTR_USER, user, 0);
            entries.push(fbb.end_table(start));
        }
    }
    Ok(entries)
}

fn write_image(
    fbb: &mut FlatBufferBuilder<'_>,
    record: &ImageRecord,
    dict: &TagDictionary,
) -> Result<Built, ProtocolError> {
    // Children first: a table can't be open while its vectors are built
    let tags = match &record.tags {
        Some(tags) => {
            let entries = write_tags(fbb, tags, dict)?;
            Some(fbb.create_vector(&entries))
        }
        None => None,
    };
    let attributes = match &record.attributes {
        Some(attributes) => {
            let entries = write_attributes(fbb, attributes)?;
            Some(fbb.create_vector(&entries))
        }
        None => None,
    };

    let start = fbb.start_table();
    if let Some(id) = record.id {
        // Id 0 is a real id, so presence is kept even at the default
        fbb.push_slot_always::<u32>(IMAGE_ID, id);
    }
    if let Some(hash) = record.hash {
        fbb.push_slot_always(IMAGE_HASH, HashStruct(hash.0));
    }
    if let Some(tags) = tags {
        fbb.push_slot_always(IMAGE_TAGS, tags);
    }
    if let Some(attributes) = attributes {
        fbb.push_slot_always(IMAGE_ATTRIBUTES, attributes);
    }
    Ok(fbb.end_table(start))
}

/// Finish a `SearchResultResponse` around an already-built union member.
fn finish_response(fbb: &mut FlatBufferBuilder<'_>, kind: u8, data: Built) -> Vec<u8> {
    let start = fbb.start_table();
    fbb.push_slot_always(RESPONSE_DATA, data.as_union_value());
    fbb.push_slot::<u8>(RESPONSE_DATA_TYPE, kind, data_type::NONE);
    let root = fbb.end_table(start);
    fbb.finish(root, None);
    fbb.finished_data().to_vec()
}

/// Build a single-field list table (`IdResponse`, `HashResponse`, `ImageResponse`).
fn list_table<T>(fbb: &mut FlatBufferBuilder<'_>, items: WIPOffset<T>) -> Built {
    let start = fbb.start_table();
    fbb.push_slot_always(LIST_ITEMS, items);
    fbb.end_table(start)
}

/// Encode a result in the legacy table generation.
///
/// Tag ids are written as names, so every id must be in `dict`. Blame users
/// are u32 on this generation; larger ones are rejected.
pub fn encode_table_response(
    result: &ResultVariant,
    dict: &TagDictionary,
) -> Result<Vec<u8>, ProtocolError> {
    let mut fbb = FlatBufferBuilder::new();
    let (kind, data) = match result {
        ResultVariant::IdList(ids) => {
            let ids = fbb.create_vector(ids);
            (data_type::IDS, list_table(&mut fbb, ids))
        }
        ResultVariant::HashList(hashes) => {
            let hashes: Vec<HashStruct> = hashes.iter().map(|h| HashStruct(h.0)).collect();
            let hashes = fbb.create_vector(&hashes);
            (data_type::HASHES, list_table(&mut fbb, hashes))
        }
        ResultVariant::ImageRecordList(records) => {
            let images = records
                .iter()
                .map(|record| write_image(&mut fbb, record, dict))
                .collect::<Result<Vec<_>, _>>()?;
            let images = fbb.create_vector(&images);
            (data_type::IMAGES, list_table(&mut fbb, images))
        }
    };
    Ok(finish_response(&mut fbb, kind, data))
}
