// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Bounded LRU memoization for expensive per-item values (embeddings,
//! thumbnails, anything keyed by image).
//!
//! Two flavors:
//!
//! - [`MemoCache`]: `&mut self`, one owner. What a worker holds.
//! - [`CoalescingMemoCache`]: `&self` and `Sync`. Concurrent misses on the
//!   same key run `compute` once; everyone else waits for that result.
//!   The index lock is held only long enough to find or create the key's
//!   slot, never while computing.
//!
//! Both treat capacity 0 as "cache nothing": every call computes, nothing is
//! stored. Errors from `get_or_try_compute` are never stored either.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

/// Hit/miss/eviction counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of lookups served from cache, 0.0 when nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// ============================================================================
// SINGLE-OWNER CACHE
// ============================================================================

/// Fixed-capacity LRU memo cache.
#[derive(Debug)]
pub struct MemoCache<K: Hash + Eq, V> {
    /// None when capacity is 0
    inner: Option<LruCache<K, V>>,
    stats: CacheStats,
}

impl<K: Hash + Eq, V: Clone> MemoCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: NonZeroUsize::new(capacity).map(LruCache::new),
            stats: CacheStats::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.as_ref().map_or(0, |c| c.cap().get())
    }

    pub fn len(&self) -> usize {
        self.inner.as_ref().map_or(0, LruCache::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Membership test. Does not promote.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.as_ref().is_some_and(|c| c.contains(key))
    }

    /// Read without promoting.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.inner.as_ref()?.peek(key)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn clear(&mut self) {
        if let Some(cache) = self.inner.as_mut() {
            cache.clear();
        }
    }

    /// Lookup that promotes on hit. Counts as a hit or a miss.
    ///
    /// For callers that need to do async work between the lookup and the
    /// compute; pair with [`insert`](Self::insert).
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let cache = self.inner.as_mut();
        match cache.and_then(|c| c.get(key)) {
            Some(value) => {
                self.stats.hits += 1;
                Some(value)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Store `value`, evicting the LRU entry if full. No-op at capacity 0.
    pub fn insert(&mut self, key: K, value: V) {
        if let Some(cache) = self.inner.as_mut() {
            let replacing = cache.contains(&key);
            if cache.push(key, value).is_some() && !replacing {
                self.stats.evictions += 1;
                tracing::trace!(capacity = cache.cap().get(), "memo cache evicted lru entry");
            }
        }
    }

    /// Cached value for `key`, computing and storing it on a miss.
    ///
    /// A hit promotes `key` to most recently used and never calls `compute`.
    /// A miss calls it exactly once; storing the result evicts the least
    /// recently used entry if the cache is full.
    pub fn get_or_compute<F>(&mut self, key: K, compute: F) -> V
    where
        F: FnOnce(&K) -> V,
    {
        match self.get_or_try_compute(key, |k| Ok::<V, std::convert::Infallible>(compute(k))) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Fallible [`get_or_compute`](Self::get_or_compute). An `Err` is
    /// returned as-is and nothing is stored.
    pub fn get_or_try_compute<F, E>(&mut self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
    {
        let Some(cache) = self.inner.as_mut() else {
            self.stats.misses += 1;
            return compute(&key);
        };

        if let Some(value) = cache.get(&key) {
            let value = value.clone();
            self.stats.hits += 1;
            tracing::trace!(len = cache.len(), "memo cache hit");
            return Ok(value);
        }

        self.stats.misses += 1;
        tracing::trace!(len = cache.len(), "memo cache miss");
        let value = compute(&key)?;
        if cache.push(key, value.clone()).is_some() {
            self.stats.evictions += 1;
            tracing::trace!(capacity = cache.cap().get(), "memo cache evicted lru entry");
        }
        Ok(value)
    }
}

// ============================================================================
// SHARED COALESCING CACHE
// ============================================================================

/// Per-key slot. Locked while its value is computed, so concurrent callers
/// for the same key queue here instead of computing again.
type Slot<V> = Arc<Mutex<Option<V>>>;

#[derive(Debug, Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// Thread-safe LRU memo cache with per-key single-flight.
///
/// Distinct keys compute in parallel. The same key computes once; callers
/// that arrive while it's running block until it finishes and then read the
/// stored value (or, if it failed, take their own turn at computing).
#[derive(Debug)]
pub struct CoalescingMemoCache<K: Hash + Eq, V> {
    index: Option<Mutex<LruCache<K, Slot<V>>>>,
    capacity: usize,
    stats: AtomicStats,
}

impl<K: Hash + Eq + Clone, V: Clone> CoalescingMemoCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            index: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
            capacity,
            stats: AtomicStats::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of keys with a slot, including ones still computing.
    pub fn len(&self) -> usize {
        self.index.as_ref().map_or(0, |i| i.lock().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Completed value for `key`, if any. Does not promote or wait.
    ///
    /// Best effort: a key whose slot is locked at that moment (computing, or
    /// another caller cloning its value) reads as absent.
    pub fn peek(&self, key: &K) -> Option<V> {
        let slot = self.index.as_ref()?.lock().peek(key).cloned()?;
        let value = slot.try_lock()?.clone();
        value
    }

    /// Best effort, like [`peek`](Self::peek).
    pub fn contains(&self, key: &K) -> bool {
        self.peek(key).is_some()
    }

    pub fn clear(&self) {
        if let Some(index) = &self.index {
            index.lock().clear();
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
        }
    }

    pub fn get_or_compute<F>(&self, key: K, compute: F) -> V
    where
        F: FnOnce(&K) -> V,
    {
        match self.get_or_try_compute(key, |k| Ok::<V, std::convert::Infallible>(compute(k))) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    pub fn get_or_try_compute<F, E>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
    {
        let Some(index) = &self.index else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            return compute(&key);
        };

        // Find or create the slot; promotes on find
        let slot = {
            let mut index = index.lock();
            match index.get(&key) {
                Some(slot) => Arc::clone(slot),
                None => {
                    let slot: Slot<V> = Arc::default();
                    if index.push(key.clone(), Arc::clone(&slot)).is_some() {
                        self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                        tracing::trace!(capacity = self.capacity, "memo cache evicted lru entry");
                    }
                    slot
                }
            }
        };

        let mut guard = slot.lock();
        if let Some(value) = guard.as_ref() {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("memo cache hit");
            return Ok(value.clone());
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("memo cache miss");
        let result = compute(&key);

        // Still holding the slot: lock order is slot then index, and the
        // index is never held while waiting on a slot.
        let mut index = index.lock();
        let owned = index.peek(&key).is_some_and(|s| Arc::ptr_eq(s, &slot));
        match result {
            Ok(value) => {
                *guard = Some(value.clone());
                // A failed caller ahead of us freed the slot; put it back
                if !owned && !index.contains(&key) && index.push(key, Arc::clone(&slot)).is_some() {
                    self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                }
                Ok(value)
            }
            Err(e) => {
                if owned {
                    index.pop(&key);
                }
                Err(e)
            }
        }
    }
}
