//! Create/read/update/delete for any [`Record`] type, straight against the store.

use std::marker::PhantomData;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::record::Record;

use super::repos::{DataAccess, RepoError, Store};

pub struct Repository<'a, E, S> {
    store: &'a S,
    _record: PhantomData<fn() -> E>,
}

impl<'a, E: Record, S: Store> Repository<'a, E, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            _record: PhantomData,
        }
    }

    pub(crate) fn store(&self) -> &'a S {
        self.store
    }

    /// Persist a freshly constructed record.
    pub async fn create(&self, record: E) -> Result<E, RepoError> {
        self.store.insert(&record)?;
        self.store.commit().await?;
        debug!(table = E::TABLE, id = record.id(), "record created");
        Ok(record)
    }

    /// Stage `record` for writing, committing immediately when `commit` is set.
    pub async fn save(&self, record: E, commit: bool) -> Result<E, RepoError> {
        self.store.add(&record)?;
        if commit {
            self.store.commit().await?;
        }
        Ok(record)
    }

    /// Apply `changes`; without `commit` the record is only changed in memory.
    pub async fn update(
        &self,
        mut record: E,
        changes: E::Changes,
        commit: bool,
    ) -> Result<E, RepoError> {
        record.apply(changes);
        if commit {
            return self.save(record, true).await;
        }
        Ok(record)
    }

    pub async fn delete(&self, record: &E, commit: bool) -> Result<(), RepoError> {
        self.store.delete(record)?;
        if commit {
            self.store.commit().await?;
            debug!(table = E::TABLE, id = record.id(), "record deleted");
        }
        Ok(())
    }

    /// Direct lookup that only accepts numeric ids.
    ///
    /// Anything that does not read as a number is reported as not found
    /// without a query; numbers are looked up by their integer form, so
    /// `"42.0"` finds `"42"`.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<E>, RepoError> {
        match numeric_key(id) {
            Some(key) => self.store.query_by_id(&key).await,
            None => {
                debug!(table = E::TABLE, id, "non-numeric id treated as not found");
                Ok(None)
            }
        }
    }

    pub async fn load(&self, id: &str) -> Result<Option<E>, RepoError> {
        self.get_by_id(id).await
    }

    pub async fn load_all(&self) -> Result<Vec<E>, RepoError> {
        self.store.query_all().await
    }
}

#[async_trait]
impl<'a, E: Record, S: Store> DataAccess<E> for Repository<'a, E, S> {
    async fn create(&self, record: E) -> Result<E, RepoError> {
        Repository::create(self, record).await
    }

    async fn load(&self, id: &str) -> Result<Option<E>, RepoError> {
        Repository::load(self, id).await
    }

    async fn load_all(&self) -> Result<Vec<E>, RepoError> {
        Repository::load_all(self).await
    }

    async fn update(&self, record: E, changes: E::Changes, commit: bool) -> Result<E, RepoError> {
        Repository::update(self, record, changes, commit).await
    }

    async fn delete(&self, record: &E, commit: bool) -> Result<(), RepoError> {
        Repository::delete(self, record, commit).await
    }
}

/// Integer form of a numeric id, or `None` when `id` is not a number.
///
/// Integer literals are normalized on their digits, so ids of any length
/// keep their exact value. Other numbers are truncated toward zero and must
/// fit in an `i64`.
pub(crate) fn numeric_key(id: &str) -> Option<String> {
    let trimmed = id.trim();
    if let Some(key) = integer_key(trimmed) {
        return Some(key);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && value.abs() < I64_BOUND => {
            Some((value.trunc() as i64).to_string())
        }
        _ => None,
    }
}

// 2^63; every float below it in magnitude truncates into `i64` range.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

fn integer_key(value: &str) -> Option<String> {
    let (negative, digits) = match value.as_bytes().first()? {
        b'-' => (true, &value[1..]),
        b'+' => (false, &value[1..]),
        _ => (false, value),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let digits = digits.trim_start_matches('0');
    Some(match (digits.is_empty(), negative) {
        (true, _) => "0".to_string(),
        (false, true) => format!("-{digits}"),
        (false, false) => digits.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use time::macros::{date, datetime};

    use super::*;
    use crate::application::repos::Database;
    use crate::domain::entities::{PatientChanges, PatientRecord};
    use crate::infra::memory::MemoryDatabase;

    fn patient(id: &str, name: &str) -> PatientRecord {
        PatientRecord {
            id: id.to_string(),
            name: name.to_string(),
            date_of_birth: None,
            created_at: datetime!(2024-01-15 12:00 UTC),
        }
    }

    #[test]
    fn numeric_key_normalizes_numbers() {
        assert_eq!(numeric_key("42").as_deref(), Some("42"));
        assert_eq!(numeric_key(" 42 ").as_deref(), Some("42"));
        assert_eq!(numeric_key("42.9").as_deref(), Some("42"));
        assert_eq!(numeric_key("-3").as_deref(), Some("-3"));
        assert_eq!(numeric_key("1e3").as_deref(), Some("1000"));
        assert_eq!(numeric_key("+007").as_deref(), Some("7"));
        assert_eq!(numeric_key("-0").as_deref(), Some("0"));
        assert_eq!(numeric_key("-0.5").as_deref(), Some("0"));
    }

    #[test]
    fn numeric_key_keeps_integers_beyond_i64() {
        assert_eq!(
            numeric_key("99999999999999999999").as_deref(),
            Some("99999999999999999999")
        );
        assert_eq!(
            numeric_key("-000099999999999999999999").as_deref(),
            Some("-99999999999999999999")
        );
        assert_eq!(numeric_key("1e300"), None);
        assert_eq!(numeric_key("-9.3e18"), None);
    }

    #[test]
    fn numeric_key_rejects_non_numbers() {
        assert_eq!(numeric_key("not-a-number"), None);
        assert_eq!(numeric_key(""), None);
        assert_eq!(numeric_key("NaN"), None);
        assert_eq!(numeric_key("inf"), None);
        assert_eq!(numeric_key("P-0042"), None);
        assert_eq!(numeric_key("-"), None);
        assert_eq!(numeric_key("+"), None);
    }

    #[tokio::test]
    async fn oversized_ids_do_not_alias_other_records() {
        let db = MemoryDatabase::new();
        let session = db.session();
        let patients = Repository::<PatientRecord, _>::new(&session);
        patients
            .create(patient("9223372036854775807", "Max Id"))
            .await
            .expect("create");

        assert!(patients.get_by_id("99999999999999999999").await.expect("lookup").is_none());
        assert!(patients.get_by_id("1e300").await.expect("lookup").is_none());
        assert!(patients.get_by_id("9223372036854775807").await.expect("lookup").is_some());
    }

    #[tokio::test]
    async fn create_then_load() {
        let db = MemoryDatabase::new();
        let session = db.session();
        let patients = Repository::<PatientRecord, _>::new(&session);

        patients.create(patient("1", "Ada Lovelace")).await.expect("create");
        let loaded = patients.load("1").await.expect("load").expect("present");

        assert_eq!(loaded, patient("1", "Ada Lovelace"));
    }

    #[tokio::test]
    async fn get_by_id_skips_store_for_non_numeric_ids() {
        let db = MemoryDatabase::new();
        let session = db.session();
        let patients = Repository::<PatientRecord, _>::new(&session);
        patients.create(patient("abc", "Named Id")).await.expect("create");

        assert!(patients.get_by_id("abc").await.expect("lookup").is_none());
        assert!(patients.get_by_id("not-a-number").await.expect("lookup").is_none());
        assert_eq!(db.stats().lookups(), 0);
    }

    #[tokio::test]
    async fn uncached_loads_always_hit_the_store() {
        let db = MemoryDatabase::new();
        let session = db.session();
        let patients = Repository::<PatientRecord, _>::new(&session);
        patients.create(patient("5", "Grace Hopper")).await.expect("create");

        for _ in 0..3 {
            assert!(patients.load("5").await.expect("load").is_some());
        }

        assert_eq!(db.stats().lookups(), 3);
    }

    #[tokio::test]
    async fn update_without_commit_stays_in_memory() {
        let db = MemoryDatabase::new();
        let session = db.session();
        let patients = Repository::<PatientRecord, _>::new(&session);
        let created = patients.create(patient("2", "Alan Turing")).await.expect("create");
        let commits = db.stats().commits();

        let changed = patients
            .update(
                created,
                PatientChanges {
                    name: Some("A. M. Turing".to_string()),
                    ..Default::default()
                },
                false,
            )
            .await
            .expect("update");

        assert_eq!(changed.name, "A. M. Turing");
        assert_eq!(db.stats().commits(), commits);
        let stored = patients.load("2").await.expect("load").expect("present");
        assert_eq!(stored.name, "Alan Turing");
    }

    #[tokio::test]
    async fn update_with_commit_persists() {
        let db = MemoryDatabase::new();
        let session = db.session();
        let patients = Repository::<PatientRecord, _>::new(&session);
        let created = patients.create(patient("3", "Barbara Liskov")).await.expect("create");

        patients
            .update(
                created,
                PatientChanges {
                    date_of_birth: Some(Some(date!(1938 - 11 - 7))),
                    ..Default::default()
                },
                true,
            )
            .await
            .expect("update");

        let stored = patients.load("3").await.expect("load").expect("present");
        assert_eq!(stored.date_of_birth, Some(date!(1938 - 11 - 7)));
    }

    #[tokio::test]
    async fn staged_delete_waits_for_commit() {
        let db = MemoryDatabase::new();
        let session = db.session();
        let patients = Repository::<PatientRecord, _>::new(&session);
        let created = patients.create(patient("4", "Edsger Dijkstra")).await.expect("create");

        patients.delete(&created, false).await.expect("stage delete");
        assert!(patients.load("4").await.expect("load").is_some());

        session.commit().await.expect("commit");
        assert!(patients.load("4").await.expect("load").is_none());
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let db = MemoryDatabase::new();
        let session = db.session();
        let patients = Repository::<PatientRecord, _>::new(&session);
        patients.create(patient("6", "First")).await.expect("create");

        let err = patients
            .create(patient("6", "Second"))
            .await
            .expect_err("duplicate id");

        assert!(matches!(err, RepoError::Duplicate { .. }));
        let stored = patients.load("6").await.expect("load").expect("present");
        assert_eq!(stored.name, "First");
    }

    #[tokio::test]
    async fn load_all_lists_committed_rows() {
        let db = MemoryDatabase::new();
        let session = db.session();
        let patients = Repository::<PatientRecord, _>::new(&session);
        patients.create(patient("1", "One")).await.expect("create");
        patients.create(patient("2", "Two")).await.expect("create");
        patients.save(patient("3", "Three"), false).await.expect("stage");

        let all = patients.load_all().await.expect("load_all");
        let ids: Vec<_> = all.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["1", "2"]);
    }
}
