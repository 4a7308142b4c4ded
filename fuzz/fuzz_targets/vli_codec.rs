// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Fuzz target for the VLI (CompactSize) codec.
//!
//! Every count and tag id in a search response is a VLI. A decoder that
//! panics here takes the whole response down with it.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tagstorm::wire::{decode_vli, encode_vli, MAX_VLI_BYTES};

fuzz_target!(|data: &[u8]| {
    let Ok((value, consumed)) = decode_vli(data) else {
        return;
    };

    assert!(consumed >= 1 && consumed <= MAX_VLI_BYTES);
    assert!(consumed <= data.len(), "consumed {} of {}", consumed, data.len());

    // Non-minimal encodings decode, but the encoder always picks the shortest
    let mut reencoded = Vec::new();
    encode_vli(value, &mut reencoded);
    assert!(reencoded.len() <= consumed);

    let (redecoded, reconsumed) =
        decode_vli(&reencoded).expect("re-encoded value should always decode");
    assert_eq!(value, redecoded);
    assert_eq!(reconsumed, reencoded.len());
});
