//! CRUD handlers shared by every exposed record type.

mod patients;
mod prescriptions;

pub use patients::patient_prescriptions;

use async_trait::async_trait;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::de::DeserializeOwned;

use crate::application::repos::{DataAccess, Database, Store};
use crate::cache::Cache;
use crate::domain::record::Record;

use super::error::ApiError;
use super::state::AppState;

/// A record type exposed under `/api/<collection>`.
#[async_trait]
pub trait Resource: Record {
    /// Singular noun used in error messages.
    const NAME: &'static str;

    /// Creation payload.
    type New: DeserializeOwned + Send + 'static;

    fn build(new: Self::New) -> Result<Self, ApiError>;

    /// Validate and normalize a PATCH body before it is applied.
    fn check_changes(_changes: &mut Self::Changes) -> Result<(), ApiError> {
        Ok(())
    }

    /// Repository the handlers go through; decides whether reads are cached.
    fn access<'a, S: Store>(store: &'a S, cache: &'a dyn Cache) -> Box<dyn DataAccess<Self> + 'a>;

    /// Reject records pointing at rows that do not exist.
    async fn check_references<S: Store>(&self, _store: &S) -> Result<(), ApiError> {
        Ok(())
    }
}

pub async fn list<D: Database, E: Resource>(
    State(state): State<AppState<D>>,
) -> Result<Json<Vec<E>>, ApiError> {
    let session = state.db.session();
    let records = E::access(&session, state.cache.as_ref()).load_all().await?;
    Ok(Json(records))
}

pub async fn show<D: Database, E: Resource>(
    State(state): State<AppState<D>>,
    Path(id): Path<String>,
) -> Result<Json<E>, ApiError> {
    let session = state.db.session();
    let record = E::access(&session, state.cache.as_ref())
        .load(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(E::NAME))?;
    Ok(Json(record))
}

pub async fn create<D: Database, E: Resource>(
    State(state): State<AppState<D>>,
    payload: Result<Json<E::New>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(new) = payload?;
    let record = E::build(new)?;

    let session = state.db.session();
    record.check_references(&session).await?;
    let created = E::access(&session, state.cache.as_ref())
        .create(record)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update<D: Database, E: Resource>(
    State(state): State<AppState<D>>,
    Path(id): Path<String>,
    payload: Result<Json<E::Changes>, JsonRejection>,
) -> Result<Json<E>, ApiError> {
    let Json(mut changes) = payload?;
    E::check_changes(&mut changes)?;

    let session = state.db.session();
    let records = E::access(&session, state.cache.as_ref());
    let record = records
        .load(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(E::NAME))?;
    let updated = records.update(record, changes, true).await?;
    Ok(Json(updated))
}

pub async fn remove<D: Database, E: Resource>(
    State(state): State<AppState<D>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let session = state.db.session();
    let records = E::access(&session, state.cache.as_ref());
    let record = records
        .load(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(E::NAME))?;
    records.delete(&record, true).await?;
    Ok(StatusCode::NO_CONTENT)
}
