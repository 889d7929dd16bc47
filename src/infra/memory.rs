//! In-memory [`Database`] used when no database URL is configured, and by tests.
//!
//! Rows are kept as JSON per table. Commits apply every staged write or none
//! of them. Foreign keys are not enforced.

use std::collections::{BTreeMap, HashMap};
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::application::repos::{Database, RepoError, Store};
use crate::domain::record::Record;
use crate::util::lock::mutex_lock;

const SOURCE: &str = "infra::memory";

type Tables = HashMap<&'static str, BTreeMap<String, Value>>;

/// Operation counters, shared by every session of one database.
#[derive(Debug, Default)]
pub struct StoreStats {
    lookups: AtomicUsize,
    scans: AtomicUsize,
    commits: AtomicUsize,
    writes: AtomicUsize,
}

impl StoreStats {
    /// Number of `query_by_id` calls.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Number of `query_all` calls.
    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    /// Number of successful commits.
    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Rows written or removed by successful commits.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
pub struct MemoryDatabase {
    tables: Arc<Mutex<Tables>>,
    stats: Arc<StoreStats>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    type Session = MemorySession;

    fn session(&self) -> MemorySession {
        MemorySession {
            tables: Arc::clone(&self.tables),
            stats: Arc::clone(&self.stats),
            pending: Mutex::new(Vec::new()),
        }
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

enum PendingWrite {
    Insert {
        table: &'static str,
        id: String,
        row: Value,
    },
    Upsert {
        table: &'static str,
        id: String,
        row: Value,
    },
    Remove {
        table: &'static str,
        id: String,
    },
}

pub struct MemorySession {
    tables: Arc<Mutex<Tables>>,
    stats: Arc<StoreStats>,
    pending: Mutex<Vec<PendingWrite>>,
}

impl MemorySession {
    fn stage(&self, write: PendingWrite) {
        mutex_lock(&self.pending, SOURCE, "stage").push(write);
    }
}

fn encode<E: Record>(record: &E) -> Result<Value, RepoError> {
    Ok(serde_json::to_value(record)?)
}

fn decode<E: Record>(row: &Value) -> Result<E, RepoError> {
    Ok(E::deserialize(row)?)
}

#[async_trait]
impl Store for MemorySession {
    async fn query_by_id<E: Record>(&self, id: &str) -> Result<Option<E>, RepoError> {
        self.stats.lookups.fetch_add(1, Ordering::SeqCst);
        let tables = mutex_lock(&self.tables, SOURCE, "query_by_id");
        tables
            .get(E::TABLE)
            .and_then(|rows| rows.get(id))
            .map(decode::<E>)
            .transpose()
    }

    async fn query_all<E: Record>(&self) -> Result<Vec<E>, RepoError> {
        self.stats.scans.fetch_add(1, Ordering::SeqCst);
        let tables = mutex_lock(&self.tables, SOURCE, "query_all");
        tables
            .get(E::TABLE)
            .map(|rows| rows.values().map(decode::<E>).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn insert<E: Record>(&self, record: &E) -> Result<(), RepoError> {
        self.stage(PendingWrite::Insert {
            table: E::TABLE,
            id: record.id().to_string(),
            row: encode(record)?,
        });
        Ok(())
    }

    fn add<E: Record>(&self, record: &E) -> Result<(), RepoError> {
        self.stage(PendingWrite::Upsert {
            table: E::TABLE,
            id: record.id().to_string(),
            row: encode(record)?,
        });
        Ok(())
    }

    fn delete<E: Record>(&self, record: &E) -> Result<(), RepoError> {
        self.stage(PendingWrite::Remove {
            table: E::TABLE,
            id: record.id().to_string(),
        });
        Ok(())
    }

    async fn commit(&self) -> Result<(), RepoError> {
        let pending = mem::take(&mut *mutex_lock(&self.pending, SOURCE, "commit.pending"));
        let count = pending.len();

        let mut tables = mutex_lock(&self.tables, SOURCE, "commit.tables");
        let mut staged = tables.clone();
        for write in pending {
            match write {
                PendingWrite::Insert { table, id, row } => {
                    let rows = staged.entry(table).or_default();
                    if rows.contains_key(&id) {
                        return Err(RepoError::Duplicate {
                            constraint: format!("{table}_pkey"),
                        });
                    }
                    rows.insert(id, row);
                }
                PendingWrite::Upsert { table, id, row } => {
                    staged.entry(table).or_default().insert(id, row);
                }
                PendingWrite::Remove { table, id } => {
                    if let Some(rows) = staged.get_mut(table) {
                        rows.remove(&id);
                    }
                }
            }
        }
        *tables = staged;

        self.stats.commits.fetch_add(1, Ordering::SeqCst);
        self.stats.writes.fetch_add(count, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::domain::entities::PatientRecord;

    fn patient(id: &str) -> PatientRecord {
        PatientRecord {
            id: id.to_string(),
            name: format!("Patient {id}"),
            date_of_birth: None,
            created_at: datetime!(2023-11-02 16:45 UTC),
        }
    }

    #[tokio::test]
    async fn staged_writes_are_invisible_until_commit() {
        let db = MemoryDatabase::new();
        let session = db.session();

        session.add(&patient("1")).expect("stage");
        assert!(
            session
                .query_by_id::<PatientRecord>("1")
                .await
                .expect("query")
                .is_none()
        );

        session.commit().await.expect("commit");
        assert_eq!(
            session.query_by_id::<PatientRecord>("1").await.expect("query"),
            Some(patient("1"))
        );
        assert_eq!(db.stats().writes(), 1);
    }

    #[tokio::test]
    async fn sessions_share_committed_rows() {
        let db = MemoryDatabase::new();
        let writer = db.session();
        let reader = db.session();

        writer.insert(&patient("1")).expect("stage");
        writer.commit().await.expect("commit");

        assert!(
            reader
                .query_by_id::<PatientRecord>("1")
                .await
                .expect("query")
                .is_some()
        );
    }

    #[tokio::test]
    async fn failed_commit_applies_nothing() {
        let db = MemoryDatabase::new();
        let session = db.session();
        session.insert(&patient("1")).expect("stage");
        session.commit().await.expect("commit");

        session.insert(&patient("2")).expect("stage");
        session.insert(&patient("1")).expect("stage");
        let err = session.commit().await.expect_err("duplicate");

        assert!(matches!(err, RepoError::Duplicate { ref constraint } if constraint == "patients_pkey"));
        assert!(
            session
                .query_by_id::<PatientRecord>("2")
                .await
                .expect("query")
                .is_none()
        );
        assert_eq!(db.stats().commits(), 1);
    }

    #[tokio::test]
    async fn query_all_orders_by_id() {
        let db = MemoryDatabase::new();
        let session = db.session();
        for id in ["3", "1", "2"] {
            session.insert(&patient(id)).expect("stage");
        }
        session.commit().await.expect("commit");

        let ids: Vec<String> = session
            .query_all::<PatientRecord>()
            .await
            .expect("query")
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, ["1", "2", "3"]);
    }

    #[tokio::test]
    async fn removing_a_missing_row_is_a_no_op() {
        let db = MemoryDatabase::new();
        let session = db.session();

        session.delete(&patient("9")).expect("stage");
        session.commit().await.expect("commit");
        assert!(
            session
                .query_all::<PatientRecord>()
                .await
                .expect("query")
                .is_empty()
        );
    }
}
