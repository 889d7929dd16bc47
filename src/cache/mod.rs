//! Record cache.
//!
//! Memoizes single-record and whole-table lookups for cacheable record types.
//! Reads go through [`cache_aside`]; writers drop the per-record key before
//! touching the database.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! backend = "memory"   # or "redis", "null"
//! capacity = 1024
//! redis_url = "redis://localhost:6379/0"   # redis backend only
//! ```

mod aside;
mod config;
mod keys;
mod redis_cache;
mod store;

pub use aside::cache_aside;
pub use config::{CacheBackend, CacheConfig};
pub use keys::CacheKey;
pub use redis_cache::RedisCache;
pub use store::{Cache, MemoryCache, NullCache};

use std::sync::Arc;

use thiserror::Error;

pub const METRIC_CACHE_HIT: &str = "rxledger_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "rxledger_cache_miss_total";
pub const METRIC_CACHE_EXPIRED: &str = "rxledger_cache_expired_total";
pub const METRIC_CACHE_EVICT: &str = "rxledger_cache_evict_total";
pub const METRIC_CACHE_INVALIDATE: &str = "rxledger_cache_invalidate_total";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("the redis cache backend needs `cache.redis_url`")]
    MissingRedisUrl,
    #[error("failed to connect to redis: {0}")]
    Connect(#[from] redis::RedisError),
}

/// Build the configured cache backend, connecting to Redis when selected.
pub async fn build(config: &CacheConfig) -> Result<Arc<dyn Cache>, CacheError> {
    let cache: Arc<dyn Cache> = match config.backend {
        CacheBackend::Memory => Arc::new(MemoryCache::new(config)),
        CacheBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .ok_or(CacheError::MissingRedisUrl)?;
            Arc::new(RedisCache::connect(url).await?)
        }
        CacheBackend::Null => Arc::new(NullCache),
    };
    Ok(cache)
}
