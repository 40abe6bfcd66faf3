//! Time-bounded result cache.
//!
//! Entries are keyed by endpoint plus canonical parameters and tagged with
//! the table generation they were computed from. An entry older than the
//! TTL or from another generation is never returned. When the cache is full
//! the oldest entry is evicted. A TTL of zero disables caching.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub endpoint: String,
    pub params: String,
}

impl CacheKey {
    pub fn new(endpoint: impl Into<String>, params: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: params.into(),
        }
    }
}

struct CacheEntry<V> {
    value: Arc<V>,
    inserted: Instant,
    generation: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

pub struct TtlCache<V> {
    entries: DashMap<CacheKey, CacheEntry<V>>,
    ttl: Duration,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V> TtlCache<V> {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub fn get(&self, key: &CacheKey, generation: u64) -> Option<Arc<V>> {
        if !self.is_enabled() {
            return None;
        }
        // Copy out before any removal; DashMap refs hold a shard lock.
        let found = self.entries.get(key).map(|entry| {
            let fresh = entry.generation == generation && entry.inserted.elapsed() < self.ttl;
            (fresh, Arc::clone(&entry.value))
        });
        match found {
            Some((true, value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(endpoint = %key.endpoint, "cache hit");
                Some(value)
            }
            Some((false, _)) => {
                self.entries.remove_if(key, |_, e| {
                    e.generation != generation || e.inserted.elapsed() >= self.ttl
                });
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(endpoint = %key.endpoint, "cache entry stale");
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store `value`. Concurrent inserts for the same key: last writer wins.
    pub fn insert(&self, key: CacheKey, value: Arc<V>, generation: u64) {
        if !self.is_enabled() {
            return;
        }
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted: Instant::now(),
                generation,
            },
        );
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().inserted)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
            debug!(endpoint = %key.endpoint, "evicted oldest cache entry");
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}
