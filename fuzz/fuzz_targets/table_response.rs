// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Fuzz target for the legacy table-generation decoder.
//!
//! Table responses are offset-linked, so a corrupt offset can point
//! anywhere, including back at itself. The FlatBuffers verifier must reject
//! it before the decoder follows it.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tagstorm::wire::{decode_table, encode_table_response};
use tagstorm::TagDictionary;

fuzz_target!(|data: &[u8]| {
    let dict: TagDictionary = [(1, "cat"), (2, "dog"), (3, "outdoor")]
        .into_iter()
        .collect();

    if let Ok(result) = decode_table(data, &dict) {
        // Every tag name resolved, so re-encoding through the same dictionary works
        let reencoded =
            encode_table_response(&result, &dict).expect("decoded result should re-encode");
        let redecoded = decode_table(&reencoded, &dict).expect("re-encoded table should decode");
        assert_eq!(result.len(), redecoded.len());
    }
});
