use std::future::Future;
use std::time::Duration;

use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use super::keys::CacheKey;
use super::store::Cache;
use super::{METRIC_CACHE_HIT, METRIC_CACHE_MISS};

/// Return the cached value for `key`, or run `loader` and cache its result for `ttl`.
///
/// Whatever the loader returns is cached, `None` included. Loader errors are
/// returned as-is and leave the cache untouched. An entry that no longer
/// decodes as `T` is dropped and treated as a miss.
pub async fn cache_aside<T, E, F, Fut>(
    cache: &dyn Cache,
    key: CacheKey,
    ttl: Duration,
    loader: F,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    if let Some(cached) = cache.get(&key).await {
        match serde_json::from_value::<T>(cached) {
            Ok(value) => {
                counter!(METRIC_CACHE_HIT, "table" => key.table()).increment(1);
                debug!(key = %key, "cache hit");
                return Ok(value);
            }
            Err(err) => {
                warn!(key = %key, error = %err, "Discarding undecodable cache entry");
                cache.delete(&key).await;
            }
        }
    }

    counter!(METRIC_CACHE_MISS, "table" => key.table()).increment(1);
    debug!(key = %key, "cache miss");

    let value = loader().await?;
    match serde_json::to_value(&value) {
        Ok(encoded) => cache.set(key, encoded, ttl).await,
        Err(err) => warn!(key = %key, error = %err, "Value not cached: failed to encode"),
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::cache::{CacheConfig, MemoryCache};

    const TTL: Duration = Duration::from_secs(60);

    fn key() -> CacheKey {
        CacheKey::record("prescriptions", "7")
    }

    #[tokio::test]
    async fn loader_runs_only_on_miss() {
        let cache = MemoryCache::new(&CacheConfig::default());
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Result<String, ()> = cache_aside(&cache, key(), TTL, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("loaded".to_string())
            })
            .await;
            assert_eq!(value, Ok("loaded".to_string()));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn absent_results_are_memoized() {
        let cache = MemoryCache::new(&CacheConfig::default());
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value: Result<Option<String>, ()> = cache_aside(&cache, key(), TTL, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            })
            .await;
            assert_eq!(value, Ok(None));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get(&key()).await, Some(serde_json::Value::Null));
    }

    #[tokio::test]
    async fn loader_errors_are_not_cached() {
        let cache = MemoryCache::new(&CacheConfig::default());

        let failed: Result<String, &str> =
            cache_aside(&cache, key(), TTL, || async { Err("db down") }).await;
        assert_eq!(failed, Err("db down"));
        assert!(cache.get(&key()).await.is_none());

        let recovered: Result<String, &str> =
            cache_aside(&cache, key(), TTL, || async { Ok("back".to_string()) }).await;
        assert_eq!(recovered, Ok("back".to_string()));
    }

    #[tokio::test]
    async fn undecodable_entries_fall_back_to_loader() {
        let cache = MemoryCache::new(&CacheConfig::default());
        cache.set(key(), json!({"unexpected": true}), TTL).await;

        let value: Result<u32, ()> = cache_aside(&cache, key(), TTL, || async { Ok(5) }).await;

        assert_eq!(value, Ok(5));
        assert_eq!(cache.get(&key()).await, Some(json!(5)));
    }
}
