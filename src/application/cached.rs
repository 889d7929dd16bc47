//! Cache-aside reads for [`Cacheable`] records.
//!
//! `load` and `load_all` are memoized; `update` and `delete` drop the
//! record's cache entry *before* writing, so a reader racing the write cannot
//! repopulate the entry with a row that is about to change. The window is
//! narrowed, not closed: a read between invalidation and commit can still
//! cache the old row until its TTL runs out. `create` drops the entry after
//! the insert commits, clearing a memoized not-found for the new id.
//!
//! The whole-table snapshot is never invalidated by single-record writes and
//! may lag behind them for up to `COLLECTION_TTL`.

use async_trait::async_trait;
use metrics::counter;
use tracing::debug;

use crate::cache::{Cache, CacheKey, METRIC_CACHE_INVALIDATE, cache_aside};
use crate::domain::record::Cacheable;

use super::records::Repository;
use super::repos::{DataAccess, RepoError, Store};

pub struct CachedRepository<'a, E, S> {
    records: Repository<'a, E, S>,
    cache: &'a dyn Cache,
}

impl<'a, E: Cacheable, S: Store> CachedRepository<'a, E, S> {
    pub fn new(store: &'a S, cache: &'a dyn Cache) -> Self {
        Self {
            records: Repository::new(store),
            cache,
        }
    }

    pub async fn create(&self, record: E) -> Result<E, RepoError> {
        let created = self.records.create(record).await?;
        self.invalidate_cache(&created).await;
        Ok(created)
    }

    pub async fn save(&self, record: E, commit: bool) -> Result<E, RepoError> {
        self.records.save(record, commit).await
    }

    /// Uncached lookup; see [`Repository::get_by_id`].
    pub async fn get_by_id(&self, id: &str) -> Result<Option<E>, RepoError> {
        self.records.get_by_id(id).await
    }

    /// Memoized lookup by raw primary key. Not-found results are cached too.
    pub async fn load(&self, id: &str) -> Result<Option<E>, RepoError> {
        let store = self.records.store();
        cache_aside(
            self.cache,
            CacheKey::record(E::TABLE, id),
            E::RECORD_TTL,
            || store.query_by_id::<E>(id),
        )
        .await
    }

    /// Memoized whole-table read.
    pub async fn load_all(&self) -> Result<Vec<E>, RepoError> {
        let store = self.records.store();
        cache_aside(
            self.cache,
            CacheKey::collection(E::TABLE),
            E::COLLECTION_TTL,
            || store.query_all::<E>(),
        )
        .await
    }

    /// Drop the memoized lookup for `record`'s id. The table snapshot is kept.
    pub async fn invalidate_cache(&self, record: &E) {
        let key = CacheKey::record(E::TABLE, record.id());
        let dropped = self.cache.delete(&key).await;
        counter!(METRIC_CACHE_INVALIDATE, "table" => E::TABLE).increment(1);
        debug!(key = %key, dropped, "cache entry invalidated");
    }

    pub async fn update(&self, record: E, changes: E::Changes, commit: bool) -> Result<E, RepoError> {
        self.invalidate_cache(&record).await;
        self.records.update(record, changes, commit).await
    }

    pub async fn delete(&self, record: &E, commit: bool) -> Result<(), RepoError> {
        self.invalidate_cache(record).await;
        self.records.delete(record, commit).await
    }
}

#[async_trait]
impl<'a, E: Cacheable, S: Store> DataAccess<E> for CachedRepository<'a, E, S> {
    async fn create(&self, record: E) -> Result<E, RepoError> {
        CachedRepository::create(self, record).await
    }

    async fn load(&self, id: &str) -> Result<Option<E>, RepoError> {
        CachedRepository::load(self, id).await
    }

    async fn load_all(&self) -> Result<Vec<E>, RepoError> {
        CachedRepository::load_all(self).await
    }

    async fn update(&self, record: E, changes: E::Changes, commit: bool) -> Result<E, RepoError> {
        CachedRepository::update(self, record, changes, commit).await
    }

    async fn delete(&self, record: &E, commit: bool) -> Result<(), RepoError> {
        CachedRepository::delete(self, record, commit).await
    }
}
