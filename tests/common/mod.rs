//! Shared test utilities and fixtures.

#![allow(dead_code)]

use tagstorm::wire::{ResponseFlags, ResponseHeader};
use tagstorm::{ImageRecord, RawResponse, ResultVariant};

// Re-export canonical test utilities from tagstorm::testing
pub use tagstorm::testing::{
    make_hash, make_record, make_records, sample_dictionary, test_config, ScriptedPrimitive,
};

// ============================================================================
// RESPONSE BUILDERS
// ============================================================================

/// Header bytes followed by `payload`.
pub fn response_bytes(flags: ResponseFlags, payload: &[u8]) -> Vec<u8> {
    let mut bytes = ResponseHeader::new(flags).to_bytes().to_vec();
    bytes.extend_from_slice(payload);
    bytes
}

/// Flat id-list response.
pub fn id_response(ids: &[u32]) -> Vec<u8> {
    tagstorm::encode_response(&ResultVariant::IdList(ids.to_vec()))
}

/// Rich record response carrying exactly the fields `records` have.
pub fn records_response(records: Vec<ImageRecord>) -> Vec<u8> {
    tagstorm::encode_response(&ResultVariant::ImageRecordList(records))
}

pub fn ok(body: impl Into<Vec<u8>>) -> RawResponse {
    RawResponse::new(200, body)
}

pub fn ok_json(value: serde_json::Value) -> RawResponse {
    RawResponse::new(200, value.to_string().into_bytes())
}

pub fn status(code: u16) -> RawResponse {
    RawResponse::new(code, Vec::new())
}

// ============================================================================
// ASSERTIONS
// ============================================================================

/// Every record carries exactly the fields `flags` select.
pub fn assert_records_match_flags(result: &ResultVariant, flags: ResponseFlags) {
    let ResultVariant::ImageRecordList(records) = result else {
        panic!("expected a record list, got {}", result.kind());
    };
    for (i, r) in records.iter().enumerate() {
        assert_eq!(r.id.is_some(), flags.has_ids(), "record {i}: id presence");
        assert_eq!(r.hash.is_some(), flags.has_hashes(), "record {i}: hash presence");
        assert_eq!(r.tags.is_some(), flags.has_tags(), "record {i}: tags presence");
        assert_eq!(
            r.attributes.is_some(),
            flags.has_attributes(),
            "record {i}: attributes presence"
        );
    }
}
