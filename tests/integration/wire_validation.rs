//! Negative tests for search-response decoding.
//!
//! Responses come off the network, so the decoder has to reject every
//! malformed shape with a precise error instead of panicking or allocating
//! what a hostile count asks for.
//!
//! ## Test Categories
//!
//! 1. **Header rejection**: magic, missing flag byte, reserved bits
//! 2. **Flat payloads**: ragged id and hash arrays
//! 3. **Record payloads**: truncation mid-field, hostile counts, bad strings
//! 4. **Table generation**: unknown union tags, unknown tag names

use crate::common::{make_records, response_bytes, sample_dictionary};
use tagstorm::wire::{decode_vli, encode_as, ImageRecords, ResponseFlags, HEADER_LEN};
use tagstorm::{
    decode, decode_as, ImageHash, ProtocolError, ResultVariant, TagDictionary, WireFormat,
};

fn records_flags() -> ResponseFlags {
    ResponseFlags::new().with_ids().with_tags()
}

// ============================================================================
// HEADER REJECTION
// ============================================================================

#[test]
fn test_empty_buffer_is_malformed_header() {
    assert!(matches!(decode(&[]), Err(ProtocolError::MalformedHeader(_))));
}

#[test]
fn test_wrong_magic() {
    let err = decode(b"TMX\x08\x01\0\0\0").unwrap_err();
    assert!(matches!(err, ProtocolError::MalformedHeader(ref m) if m.contains("magic")));
}

#[test]
fn test_magic_without_flag_byte() {
    assert!(matches!(decode(b"TMS"), Err(ProtocolError::MalformedHeader(_))));
}

#[test]
fn test_reserved_flag_bits_rejected() {
    for flag in [0x10u8, 0x28, 0x80, 0xff] {
        let bytes = [b'T', b'M', b'S', flag];
        assert!(
            matches!(decode(&bytes), Err(ProtocolError::MalformedHeader(_))),
            "flag byte {flag:#04x} should be rejected"
        );
    }
}

// ============================================================================
// FLAT PAYLOADS
// ============================================================================

#[test]
fn test_documented_id_list_vector() {
    let result = decode(b"TMS\x08\x05\0\0\0\x07\0\0\0").unwrap();
    assert_eq!(result, ResultVariant::IdList(vec![5, 7]));
}

#[test]
fn test_ragged_id_list() {
    let bytes = response_bytes(ResponseFlags::new().with_ids(), &[1, 0, 0, 0, 2, 0]);
    assert_eq!(
        decode(&bytes).unwrap_err(),
        ProtocolError::TruncatedPayload {
            offset: HEADER_LEN + 4,
            needed: 4,
            remaining: 2,
        }
    );
}

#[test]
fn test_ragged_hash_list() {
    let bytes = response_bytes(ResponseFlags::new().with_hashes(), &[0xab; 40]);
    assert_eq!(
        decode(&bytes).unwrap_err(),
        ProtocolError::TruncatedPayload {
            offset: HEADER_LEN + 32,
            needed: 32,
            remaining: 8,
        }
    );
}

#[test]
fn test_hash_list_keeps_bytes() {
    let mut payload = vec![0x11; 32];
    payload.extend_from_slice(&[0x22; 32]);
    let result = decode(&response_bytes(ResponseFlags::new().with_hashes(), &payload)).unwrap();
    assert_eq!(
        result,
        ResultVariant::HashList(vec![ImageHash([0x11; 32]), ImageHash([0x22; 32])])
    );
}

#[test]
fn test_empty_results() {
    assert_eq!(decode(b"TMS\x00").unwrap(), ResultVariant::IdList(vec![]));
    assert_eq!(decode(b"TMS\x08").unwrap(), ResultVariant::IdList(vec![]));
    assert_eq!(decode(b"TMS\x04").unwrap(), ResultVariant::HashList(vec![]));
}

#[test]
fn test_no_fields_but_payload_present() {
    let err = decode(b"TMS\x00\x01").unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::MalformedPayload { offset, .. } if offset == HEADER_LEN
    ));
}

// ============================================================================
// RECORD PAYLOADS
// ============================================================================

#[test]
fn test_hostile_tag_count_rejected_before_allocating() {
    // Tag count 0x7fffffff with nothing behind it
    let bytes = response_bytes(
        ResponseFlags::new().with_tags(),
        &[0xfe, 0xff, 0xff, 0xff, 0x7f],
    );
    assert!(matches!(
        decode(&bytes),
        Err(ProtocolError::TruncatedPayload { offset, remaining: 0, .. }) if offset == HEADER_LEN
    ));
}

#[test]
fn test_record_truncated_mid_hash() {
    let mut payload = vec![9, 0, 0, 0];
    payload.extend_from_slice(&[0x33; 10]);
    let bytes = response_bytes(ResponseFlags::new().with_ids().with_hashes(), &payload);
    assert_eq!(
        decode(&bytes).unwrap_err(),
        ProtocolError::TruncatedPayload {
            offset: HEADER_LEN + 4,
            needed: 32,
            remaining: 10,
        }
    );
}

#[test]
fn test_second_record_truncated() {
    // Record 1: id 1, no tags. Record 2: three bytes of an id.
    let bytes = response_bytes(records_flags(), &[1, 0, 0, 0, 0, 2, 0, 0]);
    assert_eq!(
        decode(&bytes).unwrap_err(),
        ProtocolError::TruncatedPayload {
            offset: HEADER_LEN + 5,
            needed: 4,
            remaining: 3,
        }
    );
}

#[test]
fn test_streaming_yields_good_records_then_one_error() {
    let payload = [1, 0, 0, 0, 1, 3, 7, 2, 0, 0];
    let mut records = ImageRecords::new(records_flags(), &payload);

    let first = records.next().unwrap().unwrap();
    assert_eq!(first.id, Some(1));
    assert_eq!(first.tags.unwrap().get(&3), Some(&7));

    assert!(records.next().unwrap().is_err());
    assert!(records.next().is_none());
    assert!(records.next().is_none());
}

#[test]
fn test_invalid_utf8_attribute_key() {
    // key_count 1, key len 2 = [ff fe], value_count 0
    let bytes = response_bytes(
        ResponseFlags::new().with_attributes(),
        &[1, 2, 0xff, 0xfe, 0],
    );
    assert!(matches!(
        decode(&bytes),
        Err(ProtocolError::MalformedPayload { offset, ref reason })
            if offset == HEADER_LEN + 2 && reason.contains("UTF-8")
    ));
}

#[test]
fn test_oversized_string_length() {
    // key_count 1, key len 0x00100001 (one past the limit)
    let bytes = response_bytes(
        ResponseFlags::new().with_attributes(),
        &[1, 0xfe, 0x01, 0x00, 0x10, 0x00],
    );
    assert!(matches!(
        decode(&bytes),
        Err(ProtocolError::MalformedPayload { offset, ref reason })
            if offset == HEADER_LEN + 1 && reason.contains("exceeds")
    ));
}

#[test]
fn test_repeated_attribute_key_merges() {
    let mut payload = vec![2];
    for (value, user) in [("a", 1u8), ("b", 2)] {
        payload.extend_from_slice(&[1, b'k', 1, 1, value.as_bytes()[0], user]);
    }
    let result = decode(&response_bytes(ResponseFlags::new().with_attributes(), &payload)).unwrap();
    let records = result.into_records();
    let attributes = records[0].attributes.as_ref().unwrap();
    assert_eq!(attributes.len(), 1);
    assert_eq!(attributes["k"].len(), 2);
    assert_eq!(attributes["k"]["b"], 2);
}

#[test]
fn test_wide_vli_values() {
    // tag id 300 (u16 form), user 70000 (u32 form)
    let payload = [1, 0xfd, 0x2c, 0x01, 0xfe, 0x70, 0x11, 0x01, 0x00];
    let result = decode(&response_bytes(ResponseFlags::new().with_tags(), &payload)).unwrap();
    let tags = result.into_records().remove(0).tags.unwrap();
    assert_eq!(tags.get(&300), Some(&70_000));
}

#[test]
fn test_truncated_vli() {
    assert_eq!(
        decode_vli(&[0xfd, 0x05]).unwrap_err(),
        ProtocolError::TruncatedPayload {
            offset: 1,
            needed: 2,
            remaining: 1,
        }
    );
}

#[test]
fn test_truncation_of_valid_response_never_panics() {
    let full = crate::common::records_response(make_records(3));
    for cut in 0..full.len() {
        // A cut on a record boundary is a valid, shorter response
        if let Ok(partial) = decode(&full[..cut]) {
            assert!(partial.len() < 3, "cut at {cut}");
        }
    }
    assert_eq!(decode(&full).unwrap().len(), 3);
}

// ============================================================================
// TABLE GENERATION
// ============================================================================

#[test]
fn test_table_round_trip_through_dictionary() {
    let dict = sample_dictionary();
    let original = ResultVariant::ImageRecordList(make_records(4));
    let bytes = encode_as(WireFormat::Table, &original, &dict).unwrap();
    assert_eq!(decode_as(WireFormat::Table, &bytes, &dict).unwrap(), original);
}

#[test]
fn test_table_unknown_tag_name() {
    let bytes = encode_as(
        WireFormat::Table,
        &ResultVariant::ImageRecordList(make_records(1)),
        &sample_dictionary(),
    )
    .unwrap();
    assert!(matches!(
        decode_as(WireFormat::Table, &bytes, &TagDictionary::new()),
        Err(ProtocolError::MalformedPayload { .. })
    ));
}

#[test]
fn test_table_garbage_is_an_error() {
    let dict = sample_dictionary();
    for bytes in [&[][..], &[1, 2, 3][..], &[0xff; 64][..]] {
        assert!(decode_as(WireFormat::Table, bytes, &dict).is_err());
    }
}
