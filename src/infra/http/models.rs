//! Request and response bodies.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::domain::entities::{
    PatientChanges, PatientRecord, PrescriptionChanges, PrescriptionRecord, iso_date,
};

use super::error::ApiError;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewPatient {
    pub id: String,
    pub name: String,
    #[serde(default, with = "iso_date::option")]
    pub date_of_birth: Option<Date>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

impl TryFrom<NewPatient> for PatientRecord {
    type Error = ApiError;

    fn try_from(new: NewPatient) -> Result<Self, ApiError> {
        Ok(Self {
            id: required("id", new.id)?,
            name: required("name", new.name)?,
            date_of_birth: new.date_of_birth,
            created_at: new.created_at.unwrap_or_else(OffsetDateTime::now_utc),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewPrescription {
    pub id: String,
    pub patient_id: String,
    pub medication: String,
    pub dosage: String,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub refills: i32,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub issued_at: Option<OffsetDateTime>,
}

impl TryFrom<NewPrescription> for PrescriptionRecord {
    type Error = ApiError;

    fn try_from(new: NewPrescription) -> Result<Self, ApiError> {
        non_negative_refills(new.refills)?;
        Ok(Self {
            id: required("id", new.id)?,
            patient_id: required("patient_id", new.patient_id)?,
            medication: required("medication", new.medication)?,
            dosage: required("dosage", new.dosage)?,
            instructions: new.instructions,
            refills: new.refills,
            issued_at: new.issued_at.unwrap_or_else(OffsetDateTime::now_utc),
        })
    }
}

/// Reject change sets that would leave a patient without a name.
pub fn check_patient_changes(changes: &mut PatientChanges) -> Result<(), ApiError> {
    if let Some(name) = changes.name.take() {
        changes.name = Some(required("name", name)?);
    }
    Ok(())
}

/// Apply the creation rules to the fields a prescription change set touches.
pub fn check_prescription_changes(changes: &mut PrescriptionChanges) -> Result<(), ApiError> {
    if let Some(medication) = changes.medication.take() {
        changes.medication = Some(required("medication", medication)?);
    }
    if let Some(dosage) = changes.dosage.take() {
        changes.dosage = Some(required("dosage", dosage)?);
    }
    if let Some(refills) = changes.refills {
        non_negative_refills(refills)?;
    }
    Ok(())
}

fn non_negative_refills(refills: i32) -> Result<(), ApiError> {
    if refills < 0 {
        return Err(ApiError::bad_request("refills must not be negative"));
    }
    Ok(())
}

fn required(field: &str, value: String) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request(format!("`{field}` must not be empty")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn new_patient_defaults_creation_time() {
        let new: NewPatient =
            serde_json::from_value(json!({"id": " 7 ", "name": "Ada"})).expect("decode");
        let record = PatientRecord::try_from(new).expect("valid");

        assert_eq!(record.id, "7");
        assert!(record.date_of_birth.is_none());
    }

    #[test]
    fn new_patient_reads_iso_birth_date() {
        let new: NewPatient = serde_json::from_value(json!({
            "id": "8",
            "name": "Grace",
            "date_of_birth": "1906-12-09"
        }))
        .expect("decode");
        let record = PatientRecord::try_from(new).expect("valid");

        assert_eq!(record.date_of_birth, Some(time::macros::date!(1906 - 12 - 9)));
    }

    #[test]
    fn change_sets_follow_creation_rules() {
        let mut changes = PrescriptionChanges {
            refills: Some(-1),
            ..Default::default()
        };
        let err = check_prescription_changes(&mut changes).expect_err("negative refills");
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);

        let mut changes = PatientChanges {
            name: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(check_patient_changes(&mut changes).is_err());

        let mut changes = PrescriptionChanges {
            dosage: Some(" 5mg ".to_string()),
            ..Default::default()
        };
        check_prescription_changes(&mut changes).expect("valid change");
        assert_eq!(changes.dosage.as_deref(), Some("5mg"));
    }

    #[test]
    fn blank_fields_are_rejected() {
        let new: NewPrescription = serde_json::from_value(json!({
            "id": "1",
            "patient_id": "1",
            "medication": "  ",
            "dosage": "5mg"
        }))
        .expect("decode");

        let err = PrescriptionRecord::try_from(new).expect_err("blank medication");
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let decoded = serde_json::from_value::<NewPatient>(json!({
            "id": "1",
            "name": "Ada",
            "ssn": "000-00-0000"
        }));
        assert!(decoded.is_err());
    }
}
