//! Store contracts the data-access layer is written against.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::record::Record;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
    #[error("record encoding failed: {0}")]
    Serialization(String),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// A unit of work against the relational store.
///
/// Writes are staged with [`Store::insert`], [`Store::add`] and
/// [`Store::delete`] and become durable, all or nothing, on
/// [`Store::commit`]. Reads only observe committed rows.
#[async_trait]
pub trait Store: Send + Sync {
    async fn query_by_id<E: Record>(&self, id: &str) -> Result<Option<E>, RepoError>;

    async fn query_all<E: Record>(&self) -> Result<Vec<E>, RepoError>;

    /// Stage a new row; committing fails with [`RepoError::Duplicate`] if the id exists.
    fn insert<E: Record>(&self, record: &E) -> Result<(), RepoError>;

    /// Stage an insert-or-replace of the row keyed by `record.id()`.
    fn add<E: Record>(&self, record: &E) -> Result<(), RepoError>;

    /// Stage removal of the row keyed by `record.id()`.
    fn delete<E: Record>(&self, record: &E) -> Result<(), RepoError>;

    async fn commit(&self) -> Result<(), RepoError>;
}

/// Hands out one [`Store`] session per request.
#[async_trait]
pub trait Database: Send + Sync + 'static {
    type Session: Store;

    fn session(&self) -> Self::Session;

    async fn health_check(&self) -> Result<(), RepoError>;
}

/// Record operations endpoint handlers call, regardless of caching.
#[async_trait]
pub trait DataAccess<E: Record>: Send + Sync {
    async fn create(&self, record: E) -> Result<E, RepoError>;

    async fn load(&self, id: &str) -> Result<Option<E>, RepoError>;

    async fn load_all(&self) -> Result<Vec<E>, RepoError>;

    async fn update(&self, record: E, changes: E::Changes, commit: bool) -> Result<E, RepoError>;

    async fn delete(&self, record: &E, commit: bool) -> Result<(), RepoError>;
}
