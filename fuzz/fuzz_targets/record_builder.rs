// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Fuzz target for record encoding round trips.
//!
//! Builds structured records from fuzzer input instead of raw bytes, so
//! the fuzzer explores the encoder side: wide VLIs, empty maps, multi-byte
//! strings.

#![no_main]

use std::collections::BTreeMap;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tagstorm::wire::{encode_image_records, ResponseFlags, ResponseHeader};
use tagstorm::{decode, ImageHash, ImageRecord};

#[derive(Debug, Arbitrary)]
struct FuzzRecord {
    id: u32,
    hash: [u8; 32],
    tags: BTreeMap<u64, u64>,
    attributes: BTreeMap<String, BTreeMap<String, u64>>,
}

#[derive(Debug, Arbitrary)]
struct Input {
    flags: u8,
    records: Vec<FuzzRecord>,
}

fuzz_target!(|input: Input| {
    let Ok(flags) = ResponseFlags::from_byte(input.flags & 0x0f) else {
        return;
    };
    if flags.is_empty() || input.records.is_empty() {
        return;
    }

    let records: Vec<ImageRecord> = input
        .records
        .into_iter()
        .map(|r| ImageRecord {
            id: flags.has_ids().then_some(r.id),
            hash: flags.has_hashes().then_some(ImageHash(r.hash)),
            tags: flags.has_tags().then_some(r.tags),
            attributes: flags.has_attributes().then_some(r.attributes),
        })
        .collect();

    let mut bytes = ResponseHeader::new(flags).to_bytes().to_vec();
    encode_image_records(flags, &records, &mut bytes);

    // Oversized strings are rejected on decode; everything else round-trips
    match decode(&bytes) {
        Ok(result) => assert_eq!(result.into_records(), records),
        Err(e) => assert!(
            records
                .iter()
                .flat_map(|r| r.attributes.iter().flatten())
                .any(|(k, vs)| k.len() > tagstorm::wire::MAX_STRING_LEN
                    || vs.keys().any(|v| v.len() > tagstorm::wire::MAX_STRING_LEN)),
            "valid records failed to decode: {}",
            e
        ),
    }
});
