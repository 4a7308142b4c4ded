// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Per-worker state for prediction-style workloads.
//!
//! A worker owns one [`WorkerContext`] and passes it by `&mut` to whatever
//! needs it. Nothing is thread-local: spawn N workers, build N contexts, and
//! each gets its own embedding cache sharing one client.

use std::sync::Arc;

use thiserror::Error;

use crate::cache::{CacheStats, MemoCache};
use crate::client::TagStormClient;
use crate::error::ClientError;
use crate::transport::RequestPrimitive;
use crate::types::ImageHash;

/// Default number of embeddings a worker keeps.
pub const DEFAULT_EMBEDDING_CACHE: usize = 1024;

#[derive(Debug, Error)]
pub enum WorkerError<E> {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("image {0} not found")]
    ImageNotFound(ImageHash),

    #[error("embedding failed: {0}")]
    Compute(E),
}

/// Client handle plus an embedding cache keyed by image hash.
pub struct WorkerContext<P, V> {
    client: Arc<TagStormClient<P>>,
    embeddings: MemoCache<ImageHash, V>,
}

impl<P: RequestPrimitive, V: Clone> WorkerContext<P, V> {
    pub fn new(client: Arc<TagStormClient<P>>, cache_capacity: usize) -> Self {
        Self {
            client,
            embeddings: MemoCache::new(cache_capacity),
        }
    }

    pub fn client(&self) -> &Arc<TagStormClient<P>> {
        &self.client
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.embeddings.stats()
    }

    pub fn embeddings(&self) -> &MemoCache<ImageHash, V> {
        &self.embeddings
    }

    /// Cached embedding for `hash`, computing it on a miss.
    pub fn embedding_for<F>(&mut self, hash: ImageHash, compute: F) -> V
    where
        F: FnOnce(&ImageHash) -> V,
    {
        self.embeddings.get_or_compute(hash, compute)
    }

    /// Cached embedding for `hash`; on a miss, download the image and run
    /// `compute` over its bytes. Failures are not cached.
    pub async fn embedding_from_image<F, E>(
        &mut self,
        hash: ImageHash,
        compute: F,
    ) -> Result<V, WorkerError<E>>
    where
        F: FnOnce(&[u8]) -> Result<V, E>,
    {
        if let Some(value) = self.embeddings.get(&hash) {
            return Ok(value.clone());
        }
        let bytes = self
            .client
            .fetch_image_bytes(&hash, None)
            .await?
            .ok_or(WorkerError::ImageNotFound(hash))?;
        let value = compute(&bytes).map_err(WorkerError::Compute)?;
        self.embeddings.insert(hash, value.clone());
        Ok(value)
    }
}
