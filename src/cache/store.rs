//! Cache storage implementations.
//!
//! Values are stored as JSON so one cache can hold every record type; the
//! typed view lives in [`cache_aside`](super::cache_aside).

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use metrics::counter;
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use crate::util::lock::mutex_lock;

use super::config::CacheConfig;
use super::keys::CacheKey;
use super::{METRIC_CACHE_EVICT, METRIC_CACHE_EXPIRED};

const SOURCE: &str = "cache::store";

/// Key/value store with per-entry TTL and explicit invalidation.
///
/// Implementations never fail the caller: a backend that cannot answer
/// reports a miss, and a write it cannot perform is logged and skipped.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Live value for `key`; expired entries read as absent.
    async fn get(&self, key: &CacheKey) -> Option<Value>;

    async fn set(&self, key: CacheKey, value: Value, ttl: Duration);

    /// Remove `key`, returning whether a live entry was dropped.
    async fn delete(&self, key: &CacheKey) -> bool;
}

struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-process LRU cache with TTL expiry.
///
/// Expired entries are dropped lazily on the read that observes them.
pub struct MemoryCache {
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
}

impl MemoryCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(config.capacity_non_zero())),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Option<Value> {
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");
        let expired = match entries.get(key) {
            Some(entry) if entry.is_live(Instant::now()) => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(key);
            counter!(METRIC_CACHE_EXPIRED, "table" => key.table()).increment(1);
            debug!(key = %key, "cache entry expired");
        }
        None
    }

    async fn set(&self, key: CacheKey, value: Value, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        let evicted = mutex_lock(&self.entries, SOURCE, "set").push(key.clone(), entry);
        // `push` also hands back the previous value when `key` was already present.
        match evicted {
            Some((evicted_key, _)) if evicted_key != key => {
                counter!(METRIC_CACHE_EVICT, "table" => evicted_key.table()).increment(1);
                debug!(key = %evicted_key, "cache entry evicted");
            }
            _ => {}
        }
    }

    async fn delete(&self, key: &CacheKey) -> bool {
        mutex_lock(&self.entries, SOURCE, "delete")
            .pop(key)
            .is_some_and(|entry| entry.is_live(Instant::now()))
    }
}

/// Cache that never holds anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCache;

#[async_trait]
impl Cache for NullCache {
    async fn get(&self, _key: &CacheKey) -> Option<Value> {
        None
    }

    async fn set(&self, _key: CacheKey, _value: Value, _ttl: Duration) {}

    async fn delete(&self, _key: &CacheKey) -> bool {
        false
    }
}
