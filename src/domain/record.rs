//! Identity and persistence contract shared by every stored entity.

use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};
use sqlx::{FromRow, Postgres, postgres::PgRow, query_builder::Separated};

use super::schema::{ColumnDef, TableSchema};

pub const DEFAULT_RECORD_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_COLLECTION_TTL: Duration = Duration::from_secs(3000);

/// A persisted entity keyed by a caller-assigned string `id`.
///
/// Records round-trip through Postgres rows (`FromRow` + [`Record::push_values`])
/// and through JSON for caching and the in-memory store.
pub trait Record:
    Clone
    + Serialize
    + DeserializeOwned
    + for<'r> FromRow<'r, PgRow>
    + Send
    + Sync
    + Unpin
    + 'static
{
    /// Table holding the records.
    const TABLE: &'static str;

    /// Typed partial update applied by [`Record::apply`].
    type Changes: DeserializeOwned + Send + 'static;

    fn id(&self) -> &str;

    /// Column definitions. The first column is the primary key `id`.
    fn columns() -> Vec<ColumnDef>;

    /// Bind one value per column, in [`Record::columns`] order.
    fn push_values(&self, values: &mut Separated<'_, 'static, Postgres, &'static str>);

    /// Assign every field present in `changes`.
    fn apply(&mut self, changes: Self::Changes);

    fn schema() -> TableSchema {
        TableSchema::new(Self::TABLE, Self::columns())
    }
}

/// Opt-in marker for records whose reads go through the cache.
///
/// Only types implementing this trait can be wrapped in a
/// [`CachedRepository`](crate::application::cached::CachedRepository).
pub trait Cacheable: Record {
    /// Lifetime of a memoized single-record lookup, including not-found results.
    const RECORD_TTL: Duration = DEFAULT_RECORD_TTL;
    /// Lifetime of the memoized "all records" snapshot.
    const COLLECTION_TTL: Duration = DEFAULT_COLLECTION_TTL;
}
