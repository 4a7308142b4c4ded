// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Fuzz target for the flat search-response decoder.
//!
//! Response bytes come straight off the network. Counts that lie, strings
//! that run past the buffer, and reserved flag bits must all come back as
//! `ProtocolError`, never a panic or an allocation sized by the attacker.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tagstorm::wire::{encode_response, ResponseHeader};
use tagstorm::{decode, ProtocolError};

fuzz_target!(|data: &[u8]| {
    match decode(data) {
        Ok(result) => {
            // Anything that decodes re-encodes to something that decodes the same
            let reencoded = encode_response(&result);
            let redecoded = decode(&reencoded).expect("re-encoded response should decode");
            assert_eq!(result.len(), redecoded.len());
            assert_eq!(result.into_records(), redecoded.into_records());
        }
        Err(ProtocolError::MalformedHeader(_)) => {
            assert!(ResponseHeader::read(data).is_err());
        }
        Err(
            ProtocolError::TruncatedPayload { offset, .. }
            | ProtocolError::MalformedPayload { offset, .. },
        ) => {
            assert!(offset <= data.len(), "offset {} past {}", offset, data.len());
        }
    }
});
