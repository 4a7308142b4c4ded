// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Test utilities shared across unit tests, integration tests, benches, and
//! fuzz targets.
//!
//! This module is always compiled but hidden from documentation.
//! It provides canonical fixtures to avoid duplication.

#![doc(hidden)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::{ClientConfig, RetryConfig};
use crate::error::TransportFailure;
use crate::transport::{RawResponse, Request, RequestPrimitive};
use crate::types::{AttributeMap, ImageHash, ImageRecord, TagDictionary, TagMap};

// ============================================================================
// SCRIPTED REQUEST PRIMITIVE
// ============================================================================

#[derive(Debug, Default)]
struct Script {
    replies: VecDeque<Result<RawResponse, TransportFailure>>,
    requests: Vec<Request>,
}

/// Request primitive that replays a fixed script and records what it was sent.
///
/// Clones share the script. Once the script runs out every request gets a
/// 500 with body "unscripted request".
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrimitive {
    script: Arc<Mutex<Script>>,
}

impl ScriptedPrimitive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response.
    pub fn respond(self, response: RawResponse) -> Self {
        self.script.lock().replies.push_back(Ok(response));
        self
    }

    /// Queue a transport failure.
    pub fn fail(self, failure: TransportFailure) -> Self {
        self.script.lock().replies.push_back(Err(failure));
        self
    }

    /// Queue `n` connection failures.
    pub fn fail_times(self, n: usize) -> Self {
        (0..n).fold(self, |p, i| {
            p.fail(TransportFailure::Connect(format!("refused #{}", i + 1)))
        })
    }

    pub fn calls(&self) -> usize {
        self.script.lock().requests.len()
    }

    pub fn requests(&self) -> Vec<Request> {
        self.script.lock().requests.clone()
    }
}

#[async_trait]
impl RequestPrimitive for ScriptedPrimitive {
    async fn execute(&self, request: &Request) -> Result<RawResponse, TransportFailure> {
        let mut script = self.script.lock();
        script.requests.push(request.clone());
        script
            .replies
            .pop_front()
            .unwrap_or_else(|| Ok(RawResponse::new(500, b"unscripted request".to_vec())))
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

/// Config pointing at `api_url` with a 1ms backoff base.
pub fn test_config(api_url: &str) -> ClientConfig {
    ClientConfig {
        api_url: api_url.to_string(),
        retry: RetryConfig {
            max_attempts: 4,
            base_delay_ms: 1,
        },
        ..ClientConfig::default()
    }
}

/// Tags 1..=4: cat, dog, outdoor, night.
pub fn sample_dictionary() -> TagDictionary {
    [(1, "cat"), (2, "dog"), (3, "outdoor"), (4, "night")]
        .into_iter()
        .collect()
}

/// Deterministic hash whose every byte is `seed`.
pub fn make_hash(seed: u8) -> ImageHash {
    ImageHash([seed; 32])
}

/// Record with every field set, tags drawn from [`sample_dictionary`].
pub fn make_record(id: u32) -> ImageRecord {
    let tags: TagMap = [(u64::from(id % 4) + 1, 10), (3, u64::from(id))]
        .into_iter()
        .collect();
    let mut attributes = AttributeMap::new();
    attributes
        .entry("rating".to_string())
        .or_default()
        .insert(if id % 2 == 0 { "safe" } else { "general" }.to_string(), 10);
    attributes
        .entry("source".to_string())
        .or_default()
        .insert(format!("camera-{}", id), 11);
    ImageRecord {
        id: Some(id),
        hash: Some(make_hash(id as u8)),
        tags: Some(tags),
        attributes: Some(attributes),
    }
}

pub fn make_records(n: u32) -> Vec<ImageRecord> {
    (1..=n).map(make_record).collect()
}
