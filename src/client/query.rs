// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Search query model, serialized to the service's JSON shape.
//!
//! ```json
//! {
//!   "select": ["id", "tags"],
//!   "order_by": "id",
//!   "limit": 100,
//!   "operator": {"and": [{"tag": 12}, {"not": {"attribute": ["rating", "explicit"]}}]}
//! }
//! ```
//!
//! The service refuses operator trees nested deeper than
//! [`MAX_QUERY_DEPTH`]; we check before sending so the caller gets a typed
//! error instead of a 400.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::types::TagId;
use crate::wire::ResponseFlags;

/// Deepest operator nesting the service accepts. A bare leaf is depth 0.
pub const MAX_QUERY_DEPTH: usize = 5;

/// Boolean filter over images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchOperator {
    Not(Box<SearchOperator>),
    And(Box<SearchOperator>, Box<SearchOperator>),
    Or(Box<SearchOperator>, Box<SearchOperator>),
    Tag(TagId),
    /// Key, and optionally a value. A bare key matches any value.
    Attribute(String, Option<String>),
    MinId(u64),
    MaxId(u64),
}

impl SearchOperator {
    pub fn tag(id: TagId) -> Self {
        Self::Tag(id)
    }

    pub fn attribute(key: impl Into<String>, value: Option<&str>) -> Self {
        Self::Attribute(key.into(), value.map(str::to_owned))
    }

    pub fn min_id(id: u64) -> Self {
        Self::MinId(id)
    }

    pub fn max_id(id: u64) -> Self {
        Self::MaxId(id)
    }

    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    pub fn and(self, other: Self) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Self) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    /// Conjunction of all `ops`, built as a balanced tree so that n terms cost
    /// ceil(log2 n) levels rather than n - 1. None if `ops` is empty.
    pub fn all_of(ops: impl IntoIterator<Item = Self>) -> Option<Self> {
        Self::balanced(ops.into_iter().collect(), Self::and)
    }

    /// Disjunction of all `ops`, balanced like [`all_of`](Self::all_of).
    pub fn any_of(ops: impl IntoIterator<Item = Self>) -> Option<Self> {
        Self::balanced(ops.into_iter().collect(), Self::or)
    }

    fn balanced(mut ops: Vec<Self>, join: fn(Self, Self) -> Self) -> Option<Self> {
        while ops.len() > 1 {
            let mut next = Vec::with_capacity(ops.len().div_ceil(2));
            let mut iter = ops.into_iter();
            while let Some(left) = iter.next() {
                next.push(match iter.next() {
                    Some(right) => join(left, right),
                    None => left,
                });
            }
            ops = next;
        }
        ops.pop()
    }

    /// Nesting depth; a leaf is 0.
    pub fn depth(&self) -> usize {
        match self {
            Self::Not(inner) => 1 + inner.depth(),
            Self::And(a, b) | Self::Or(a, b) => 1 + a.depth().max(b.depth()),
            Self::Tag(_) | Self::Attribute(..) | Self::MinId(_) | Self::MaxId(_) => 0,
        }
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        let depth = self.depth();
        if depth > MAX_QUERY_DEPTH {
            return Err(ClientError::InvalidQuery(format!(
                "operator nested {} levels deep, limit is {}",
                depth, MAX_QUERY_DEPTH
            )));
        }
        Ok(())
    }
}

impl fmt::Display for SearchOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Not(inner) => write!(f, "NOT {}", inner),
            Self::And(a, b) => write!(f, "({} AND {})", a, b),
            Self::Or(a, b) => write!(f, "({} OR {})", a, b),
            Self::Tag(id) => write!(f, "tag:{}", id),
            Self::Attribute(key, Some(value)) => write!(f, "{}={}", key, value),
            Self::Attribute(key, None) => write!(f, "{}=*", key),
            Self::MinId(id) => write!(f, "id>={}", id),
            Self::MaxId(id) => write!(f, "id<={}", id),
        }
    }
}

/// Field to include in results. Each maps to one flag bit of the response.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SearchSelect {
    Id,
    Hash,
    Tags,
    Attributes,
}

impl SearchSelect {
    pub const ALL: [SearchSelect; 4] = [Self::Id, Self::Hash, Self::Tags, Self::Attributes];

    /// Flags a response to this selection should carry.
    pub fn flags(select: &[SearchSelect]) -> ResponseFlags {
        select.iter().fold(ResponseFlags::new(), |flags, s| match s {
            Self::Id => flags.with_ids(),
            Self::Hash => flags.with_hashes(),
            Self::Tags => flags.with_tags(),
            Self::Attributes => flags.with_attributes(),
        })
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OrderBy {
    #[default]
    Id,
    Hash,
}

/// Body of `POST /api/search_images`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub select: Vec<SearchSelect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<SearchOperator>,
}

impl SearchQuery {
    pub fn new(select: impl IntoIterator<Item = SearchSelect>) -> Self {
        Self {
            select: select.into_iter().collect(),
            order_by: None,
            limit: None,
            operator: None,
        }
    }

    pub fn operator(mut self, operator: SearchOperator) -> Self {
        self.operator = Some(operator);
        self
    }

    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = Some(order_by);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn expected_flags(&self) -> ResponseFlags {
        SearchSelect::flags(&self.select)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.select.is_empty() {
            return Err(ClientError::InvalidQuery(
                "select at least one field".to_string(),
            ));
        }
        if self.limit == Some(0) {
            return Err(ClientError::InvalidQuery("limit must be positive".to_string()));
        }
        match &self.operator {
            Some(op) => op.validate(),
            None => Ok(()),
        }
    }
}
