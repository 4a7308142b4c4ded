//! Codec properties: round trips, VLI minimality, and robustness on
//! arbitrary input.

use proptest::prelude::*;

use crate::common::response_bytes;
use crate::{hash_strategy, records_strategy, vli_strategy};
use tagstorm::wire::{
    decode_table, decode_vli, encode_as, encode_image_records, encode_vli, ResponseHeader,
    HEADER_LEN, MAGIC,
};
use tagstorm::{decode, encode_response, ProtocolError, ResultVariant, TagDictionary, WireFormat};

fn vli_width(value: u64) -> usize {
    match value {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

/// Every error offset points inside (or just past) the buffer.
fn assert_offset_in_bounds(err: &ProtocolError, len: usize) {
    match err {
        ProtocolError::MalformedHeader(_) => {}
        ProtocolError::TruncatedPayload { offset, .. }
        | ProtocolError::MalformedPayload { offset, .. } => {
            assert!(*offset <= len, "offset {} beyond buffer of {}", offset, len);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    // ========================================================================
    // ROUND TRIPS
    // ========================================================================

    #[test]
    fn prop_id_list_round_trip(ids in prop::collection::vec(any::<u32>(), 0..200)) {
        let result = ResultVariant::IdList(ids);
        prop_assert_eq!(decode(&encode_response(&result)).unwrap(), result);
    }

    #[test]
    fn prop_hash_list_round_trip(hashes in prop::collection::vec(hash_strategy(), 0..20)) {
        let result = ResultVariant::HashList(hashes);
        prop_assert_eq!(decode(&encode_response(&result)).unwrap(), result);
    }

    /// Whatever the flags, every selected field comes back and nothing else.
    #[test]
    fn prop_records_round_trip((flags, records) in records_strategy()) {
        let mut payload = Vec::new();
        encode_image_records(flags, &records, &mut payload);
        let bytes = response_bytes(flags, &payload);

        let decoded = decode(&bytes).unwrap();
        prop_assert_eq!(decoded.len(), records.len());
        prop_assert_eq!(decoded.into_records(), records);
    }

    #[test]
    fn prop_table_id_list_round_trip(ids in prop::collection::vec(any::<u32>(), 1..100)) {
        let dict = TagDictionary::new();
        let result = ResultVariant::IdList(ids);
        let bytes = encode_as(WireFormat::Table, &result, &dict).unwrap();
        prop_assert_eq!(decode_table(&bytes, &dict).unwrap(), result);
    }

    // ========================================================================
    // VLI
    // ========================================================================

    #[test]
    fn prop_vli_round_trip_shortest_form(value in vli_strategy()) {
        let mut buf = Vec::new();
        encode_vli(value, &mut buf);
        prop_assert_eq!(buf.len(), vli_width(value));
        prop_assert_eq!(decode_vli(&buf).unwrap(), (value, buf.len()));
    }

    #[test]
    fn prop_vli_ignores_trailing_bytes(value in vli_strategy(), tail in prop::collection::vec(any::<u8>(), 0..8)) {
        let mut buf = Vec::new();
        encode_vli(value, &mut buf);
        let width = buf.len();
        buf.extend_from_slice(&tail);
        prop_assert_eq!(decode_vli(&buf).unwrap(), (value, width));
    }

    // ========================================================================
    // ROBUSTNESS
    // ========================================================================

    /// Any prefix of a valid response decodes to fewer records or fails
    /// cleanly.
    #[test]
    fn prop_truncation_never_panics((flags, records) in records_strategy(), cut in any::<prop::sample::Index>()) {
        let mut bytes = ResponseHeader::new(flags).to_bytes().to_vec();
        encode_image_records(flags, &records, &mut bytes);
        let cut = cut.index(bytes.len());

        match decode(&bytes[..cut]) {
            Ok(partial) => prop_assert!(partial.len() <= records.len()),
            Err(e) => assert_offset_in_bounds(&e, cut),
        }
    }

    /// Arbitrary payload behind a valid header never panics.
    #[test]
    fn prop_arbitrary_payload(flag in 0u8..16, payload in prop::collection::vec(any::<u8>(), 0..256)) {
        let mut bytes = MAGIC.to_vec();
        bytes.push(flag);
        bytes.extend_from_slice(&payload);
        if let Err(e) = decode(&bytes) {
            assert_offset_in_bounds(&e, bytes.len());
        }
    }

    /// Flat id payloads decode iff their length is a multiple of four.
    #[test]
    fn prop_id_payload_length_decides(payload in prop::collection::vec(any::<u8>(), 0..64)) {
        let bytes = response_bytes(tagstorm::wire::ResponseFlags::new().with_ids(), &payload);
        let result = decode(&bytes);
        if payload.len() % 4 == 0 {
            prop_assert_eq!(result.unwrap().len(), payload.len() / 4);
        } else {
            let whole = payload.len() - payload.len() % 4;
            prop_assert_eq!(
                result.unwrap_err(),
                ProtocolError::TruncatedPayload {
                    offset: HEADER_LEN + whole,
                    needed: 4,
                    remaining: payload.len() % 4,
                }
            );
        }
    }

    #[test]
    fn prop_arbitrary_table_bytes(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let dict = crate::common::sample_dictionary();
        let _ = decode_table(&bytes, &dict);
    }
}
