//! Postgres-backed record store.

mod statements;
mod util;

pub use util::map_sqlx_error;

use std::mem;
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::{
    Postgres, QueryBuilder,
    postgres::{PgPool, PgPoolOptions},
    query,
};
use tracing::{debug, info};

use crate::application::repos::{Database, RepoError, Store};
use crate::domain::record::Record;
use crate::domain::schema::TableSchema;
use crate::util::lock::mutex_lock;

const SOURCE: &str = "infra::db";

#[derive(Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Create every missing table, in the given order.
    pub async fn ensure_schema(&self, schemas: &[TableSchema]) -> Result<(), RepoError> {
        for schema in schemas {
            let sql = schema.create_sql();
            query(&sql)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            info!(table = schema.name, "table ensured");
        }
        Ok(())
    }
}

#[async_trait]
impl Database for PgDatabase {
    type Session = PgSession;

    fn session(&self) -> PgSession {
        PgSession {
            pool: self.pool.clone(),
            pending: Mutex::new(Vec::new()),
        }
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }
}

/// Per-request unit of work. Staged statements run in one transaction on commit.
pub struct PgSession {
    pool: PgPool,
    pending: Mutex<Vec<QueryBuilder<'static, Postgres>>>,
}

impl PgSession {
    fn stage(&self, statement: QueryBuilder<'static, Postgres>) {
        mutex_lock(&self.pending, SOURCE, "stage").push(statement);
    }
}

#[async_trait]
impl Store for PgSession {
    async fn query_by_id<E: Record>(&self, id: &str) -> Result<Option<E>, RepoError> {
        let mut qb = statements::select_by_id::<E>(id);
        qb.build_query_as::<E>()
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn query_all<E: Record>(&self) -> Result<Vec<E>, RepoError> {
        let mut qb = statements::select_all::<E>();
        qb.build_query_as::<E>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    fn insert<E: Record>(&self, record: &E) -> Result<(), RepoError> {
        self.stage(statements::insert(record));
        Ok(())
    }

    fn add<E: Record>(&self, record: &E) -> Result<(), RepoError> {
        self.stage(statements::upsert(record));
        Ok(())
    }

    fn delete<E: Record>(&self, record: &E) -> Result<(), RepoError> {
        self.stage(statements::delete(record));
        Ok(())
    }

    async fn commit(&self) -> Result<(), RepoError> {
        let mut pending = mem::take(&mut *mutex_lock(&self.pending, SOURCE, "commit"));
        if pending.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        for statement in pending.iter_mut() {
            statement
                .build()
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }
        tx.commit().await.map_err(map_sqlx_error)?;

        debug!(statements = pending.len(), "transaction committed");
        Ok(())
    }
}
