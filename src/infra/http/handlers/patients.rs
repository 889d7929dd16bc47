use axum::Json;
use axum::extract::{Path, State};

use crate::application::records::Repository;
use crate::application::repos::{DataAccess, Database, Store};
use crate::cache::Cache;
use crate::domain::entities::{PatientChanges, PatientRecord, PrescriptionRecord};
use crate::infra::http::error::ApiError;
use crate::infra::http::models::{NewPatient, check_patient_changes};
use crate::infra::http::state::AppState;

use super::Resource;

// Patients are read straight from the store on every request.
impl Resource for PatientRecord {
    const NAME: &'static str = "patient";
    type New = NewPatient;

    fn build(new: NewPatient) -> Result<Self, ApiError> {
        Self::try_from(new)
    }

    fn check_changes(changes: &mut PatientChanges) -> Result<(), ApiError> {
        check_patient_changes(changes)
    }

    fn access<'a, S: Store>(store: &'a S, _cache: &'a dyn Cache) -> Box<dyn DataAccess<Self> + 'a> {
        Box::new(Repository::<Self, S>::new(store))
    }
}

/// Prescriptions issued to one patient, taken from the cached table snapshot.
pub async fn patient_prescriptions<D: Database>(
    State(state): State<AppState<D>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<PrescriptionRecord>>, ApiError> {
    let session = state.db.session();
    let cache = state.cache.as_ref();

    let patient = PatientRecord::access(&session, cache)
        .load(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(PatientRecord::NAME))?;

    let prescriptions = PrescriptionRecord::access(&session, cache)
        .load_all()
        .await?
        .into_iter()
        .filter(|prescription| prescription.patient_id == patient.id)
        .collect();
    Ok(Json(prescriptions))
}
