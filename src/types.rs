// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Core types shared by the codec, the client, and the caches.
//!
//! `ResultVariant` is the decoded form of a search response. Exactly one shape
//! per response, and every consumer matches on it exhaustively. There is no
//! "maybe ids, maybe records" struct with half its fields empty.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Tag identifier as assigned by the service.
pub type TagId = u64;

/// Identifier of the user who applied a tag or attribute value ("blame").
pub type UserId = u64;

/// Per-image tag map: tag id -> blame user.
pub type TagMap = BTreeMap<TagId, UserId>;

/// Per-image attribute map: key -> value -> blame user.
pub type AttributeMap = BTreeMap<String, BTreeMap<String, UserId>>;

// ============================================================================
// IMAGE HASH
// ============================================================================

/// 32-byte content hash of an image (SHA-256 of the file bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ImageHash(pub [u8; 32]);

impl ImageHash {
    pub const LEN: usize = 32;

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; 32]> for ImageHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for ImageHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ImageHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageHash({})", self.to_hex())
    }
}

/// Error parsing an [`ImageHash`] from hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseHashError(String);

impl fmt::Display for ParseHashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid image hash: {}", self.0)
    }
}

impl std::error::Error for ParseHashError {}

impl FromStr for ImageHash {
    type Err = ParseHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|e| ParseHashError(e.to_string()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for ImageHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ImageHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// DECODED RESULTS
// ============================================================================

/// One image from a rich search response. A field is `Some` iff the response
/// selected it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<ImageHash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<TagMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<AttributeMap>,
}

impl ImageRecord {
    /// Resolve tag ids to names. Ids the dictionary doesn't know are skipped.
    pub fn tag_names<'a>(&self, dict: &'a TagDictionary) -> Vec<&'a str> {
        self.tags
            .iter()
            .flat_map(|tags| tags.keys())
            .filter_map(|id| dict.name(*id))
            .collect()
    }
}

/// Decoded search response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "items", rename_all = "snake_case")]
pub enum ResultVariant {
    IdList(Vec<u32>),
    HashList(Vec<ImageHash>),
    ImageRecordList(Vec<ImageRecord>),
}

impl Default for ResultVariant {
    /// All-zero flags decode to an empty id list.
    fn default() -> Self {
        Self::IdList(Vec::new())
    }
}

impl ResultVariant {
    pub fn len(&self) -> usize {
        match self {
            Self::IdList(ids) => ids.len(),
            Self::HashList(hashes) => hashes.len(),
            Self::ImageRecordList(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short name of the shape, for logs and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::IdList(_) => "ids",
            Self::HashList(_) => "hashes",
            Self::ImageRecordList(_) => "images",
        }
    }

    /// Image ids carried by this result, whatever the shape.
    ///
    /// Hash lists carry no ids and return an empty vec.
    pub fn ids(&self) -> Vec<u32> {
        match self {
            Self::IdList(ids) => ids.clone(),
            Self::HashList(_) => Vec::new(),
            Self::ImageRecordList(records) => records.iter().filter_map(|r| r.id).collect(),
        }
    }

    /// Normalize any shape into records. Flat lists become records with a
    /// single field set.
    pub fn into_records(self) -> Vec<ImageRecord> {
        match self {
            Self::IdList(ids) => ids
                .into_iter()
                .map(|id| ImageRecord {
                    id: Some(id),
                    ..ImageRecord::default()
                })
                .collect(),
            Self::HashList(hashes) => hashes
                .into_iter()
                .map(|hash| ImageRecord {
                    hash: Some(hash),
                    ..ImageRecord::default()
                })
                .collect(),
            Self::ImageRecordList(records) => records,
        }
    }
}

// ============================================================================
// TAG DICTIONARY
// ============================================================================

/// Bidirectional tag id <-> name map.
///
/// The in-memory tag representation is always the id. Wire generations that
/// carry names get converted through this at the decode boundary.
#[derive(Debug, Clone, Default)]
pub struct TagDictionary {
    by_name: HashMap<String, TagId>,
    by_id: HashMap<TagId, String>,
}

impl TagDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: TagId, name: impl Into<String>) {
        let name = name.into();
        if let Some(old) = self.by_id.insert(id, name.clone()) {
            self.by_name.remove(&old);
        }
        self.by_name.insert(name, id);
    }

    pub fn id(&self, name: &str) -> Option<TagId> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, id: TagId) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_id.clear();
        self.by_name.clear();
    }
}

impl<S: Into<String>> FromIterator<(TagId, S)> for TagDictionary {
    fn from_iter<I: IntoIterator<Item = (TagId, S)>>(iter: I) -> Self {
        let mut dict = Self::new();
        for (id, name) in iter {
            dict.insert(id, name);
        }
        dict
    }
}
