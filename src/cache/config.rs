//! Cache configuration.

use std::num::NonZeroUsize;
use std::str::FromStr;

const DEFAULT_CAPACITY: usize = 1024;

/// Which [`Cache`](super::Cache) implementation backs the data-access layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    /// In-process LRU with per-entry TTL.
    Memory,
    /// Shared Redis server; entries survive restarts and are seen by every instance.
    Redis,
    /// Stores nothing; every read goes to the database.
    Null,
}

impl FromStr for CacheBackend {
    type Err = String;

    /// Accepts the short names as well as the `SimpleCache`/`RedisCache`/`NullCache`
    /// spellings used by older deployments.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" | "simple" | "simplecache" => Ok(Self::Memory),
            "null" | "none" | "nullcache" => Ok(Self::Null),
            "redis" | "rediscache" => Ok(Self::Redis),
            other => Err(format!("unknown cache backend `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Maximum number of live entries before LRU eviction.
    pub capacity: usize,
    /// Connection URL for the `redis` backend.
    pub redis_url: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            capacity: DEFAULT_CAPACITY,
            redis_url: None,
        }
    }
}

impl CacheConfig {
    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }
}
