use async_trait::async_trait;

use crate::application::cached::CachedRepository;
use crate::application::repos::{DataAccess, Store};
use crate::cache::Cache;
use crate::domain::entities::{PatientRecord, PrescriptionChanges, PrescriptionRecord};
use crate::infra::http::error::ApiError;
use crate::infra::http::models::{NewPrescription, check_prescription_changes};

use super::Resource;

#[async_trait]
impl Resource for PrescriptionRecord {
    const NAME: &'static str = "prescription";
    type New = NewPrescription;

    fn build(new: NewPrescription) -> Result<Self, ApiError> {
        Self::try_from(new)
    }

    fn check_changes(changes: &mut PrescriptionChanges) -> Result<(), ApiError> {
        check_prescription_changes(changes)
    }

    fn access<'a, S: Store>(store: &'a S, cache: &'a dyn Cache) -> Box<dyn DataAccess<Self> + 'a> {
        Box::new(CachedRepository::<Self, S>::new(store, cache))
    }

    async fn check_references<S: Store>(&self, store: &S) -> Result<(), ApiError> {
        match store.query_by_id::<PatientRecord>(&self.patient_id).await? {
            Some(_) => Ok(()),
            None => Err(ApiError::bad_request(format!(
                "unknown patient `{}`",
                self.patient_id
            ))),
        }
    }
}
