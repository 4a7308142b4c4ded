// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! JSON bodies exchanged with the service outside of search.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{ImageHash, TagDictionary, TagId, UserId};

/// Entry of `GET /api/tags`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiTag {
    pub id: TagId,
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Image as returned by `image_by_hash` / `image_by_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiImage {
    pub id: u64,
    pub hash: ImageHash,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub tags: Vec<TagId>,
    /// Key -> values, no blame
    #[serde(default)]
    pub attributes: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub caption: Option<String>,
}

impl ApiImage {
    pub fn tag_names<'a>(&self, dict: &'a TagDictionary) -> Vec<&'a str> {
        self.tags.iter().filter_map(|id| dict.name(*id)).collect()
    }
}

/// Audit log row from `GET /api/logs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    /// Unix seconds
    pub timestamp: i64,
    pub user_id: UserId,
    pub action: String,
    #[serde(default)]
    pub image_hash: Option<ImageHash>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub attribute_key: Option<String>,
    #[serde(default)]
    pub attribute_value: Option<String>,
}

/// Filters for [`crate::client::TagStormClient::list_logs`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    pub image_hash: Option<ImageHash>,
    pub action: Option<String>,
    /// Rows per page; the client keeps paging until a page comes back empty
    pub page_size: Option<u64>,
}

impl LogFilter {
    pub fn image(mut self, hash: ImageHash) -> Self {
        self.image_hash = Some(hash);
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }
}
