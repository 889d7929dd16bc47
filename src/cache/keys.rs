//! Cache key definitions.

use std::fmt;

/// Identifies a memoized lookup.
///
/// Single-record entries and the collection snapshot of the same table are
/// independent keys: invalidating one never touches the other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// One record looked up by primary key.
    Record { table: &'static str, id: String },
    /// Every record of a table.
    Collection { table: &'static str },
}

impl CacheKey {
    pub fn record(table: &'static str, id: impl Into<String>) -> Self {
        Self::Record {
            table,
            id: id.into(),
        }
    }

    pub fn collection(table: &'static str) -> Self {
        Self::Collection { table }
    }

    pub fn table(&self) -> &'static str {
        match self {
            Self::Record { table, .. } | Self::Collection { table } => table,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Record { table, id } => write!(f, "{table}:{id}"),
            Self::Collection { table } => write!(f, "{table}:*"),
        }
    }
}
