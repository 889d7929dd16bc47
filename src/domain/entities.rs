//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{Postgres, query_builder::Separated};
use time::{Date, OffsetDateTime};

use super::record::{Cacheable, Record};
use super::schema::{ColumnDef, ReferenceOptions, TableSchema, reference_col};

time::serde::format_description!(pub iso_date, Date, "[year]-[month]-[day]");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PatientRecord {
    pub id: String,
    pub name: String,
    #[serde(default, with = "iso_date::option")]
    pub date_of_birth: Option<Date>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// `date_of_birth: null` clears the stored date; leaving it out keeps it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PatientChanges {
    pub name: Option<String>,
    #[serde(deserialize_with = "present_date")]
    pub date_of_birth: Option<Option<Date>>,
}

impl Record for PatientRecord {
    const TABLE: &'static str = "patients";
    type Changes = PatientChanges;

    fn id(&self) -> &str {
        &self.id
    }

    fn columns() -> Vec<ColumnDef> {
        vec![
            ColumnDef::primary_key("id"),
            ColumnDef::new("name", "TEXT"),
            ColumnDef::new("date_of_birth", "DATE").nullable(),
            ColumnDef::new("created_at", "TIMESTAMPTZ"),
        ]
    }

    fn push_values(&self, values: &mut Separated<'_, 'static, Postgres, &'static str>) {
        values
            .push_bind(self.id.clone())
            .push_bind(self.name.clone())
            .push_bind(self.date_of_birth)
            .push_bind(self.created_at);
    }

    fn apply(&mut self, changes: PatientChanges) {
        let PatientChanges {
            name,
            date_of_birth,
        } = changes;
        if let Some(name) = name {
            self.name = name;
        }
        if let Some(date_of_birth) = date_of_birth {
            self.date_of_birth = date_of_birth;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PrescriptionRecord {
    pub id: String,
    pub patient_id: String,
    pub medication: String,
    pub dosage: String,
    pub instructions: Option<String>,
    pub refills: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,
}

/// `instructions: null` clears the stored text; leaving it out keeps it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrescriptionChanges {
    pub medication: Option<String>,
    pub dosage: Option<String>,
    #[serde(deserialize_with = "present")]
    pub instructions: Option<Option<String>>,
    pub refills: Option<i32>,
}

impl Record for PrescriptionRecord {
    const TABLE: &'static str = "prescriptions";
    type Changes = PrescriptionChanges;

    fn id(&self) -> &str {
        &self.id
    }

    fn columns() -> Vec<ColumnDef> {
        vec![
            ColumnDef::primary_key("id"),
            reference_col(
                "patient_id",
                PatientRecord::TABLE,
                ReferenceOptions {
                    foreign_key: vec!["ON DELETE CASCADE".to_string()],
                    ..Default::default()
                },
            ),
            ColumnDef::new("medication", "TEXT"),
            ColumnDef::new("dosage", "TEXT"),
            ColumnDef::new("instructions", "TEXT").nullable(),
            ColumnDef::new("refills", "INTEGER").with_option("DEFAULT 0"),
            ColumnDef::new("issued_at", "TIMESTAMPTZ"),
        ]
    }

    fn push_values(&self, values: &mut Separated<'_, 'static, Postgres, &'static str>) {
        values
            .push_bind(self.id.clone())
            .push_bind(self.patient_id.clone())
            .push_bind(self.medication.clone())
            .push_bind(self.dosage.clone())
            .push_bind(self.instructions.clone())
            .push_bind(self.refills)
            .push_bind(self.issued_at);
    }

    fn apply(&mut self, changes: PrescriptionChanges) {
        let PrescriptionChanges {
            medication,
            dosage,
            instructions,
            refills,
        } = changes;
        if let Some(medication) = medication {
            self.medication = medication;
        }
        if let Some(dosage) = dosage {
            self.dosage = dosage;
        }
        if let Some(instructions) = instructions {
            self.instructions = instructions;
        }
        if let Some(refills) = refills {
            self.refills = refills;
        }
    }
}

// Prescriptions are read far more often than they change.
impl Cacheable for PrescriptionRecord {}

// Any field that reaches the deserializer was sent, `null` included.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

fn present_date<'de, D>(deserializer: D) -> Result<Option<Option<Date>>, D::Error>
where
    D: Deserializer<'de>,
{
    iso_date::option::deserialize(deserializer).map(Some)
}

/// Every table, in dependency order.
pub fn all_schemas() -> Vec<TableSchema> {
    vec![PatientRecord::schema(), PrescriptionRecord::schema()]
}

#[cfg(test)]
mod tests {
    use time::macros::{date, datetime};

    use super::*;

    fn sample_patient() -> PatientRecord {
        PatientRecord {
            id: "1".to_string(),
            name: "Ada Lovelace".to_string(),
            date_of_birth: Some(date!(1815 - 12 - 10)),
            created_at: datetime!(2024-01-15 12:00 UTC),
        }
    }

    fn sample_prescription() -> PrescriptionRecord {
        PrescriptionRecord {
            id: "10".to_string(),
            patient_id: "1".to_string(),
            medication: "Amoxicillin".to_string(),
            dosage: "500mg".to_string(),
            instructions: None,
            refills: 0,
            issued_at: datetime!(2024-03-01 9:30 UTC),
        }
    }

    #[test]
    fn apply_only_touches_present_fields() {
        let mut prescription = sample_prescription();
        prescription.apply(PrescriptionChanges {
            dosage: Some("250mg".to_string()),
            refills: Some(2),
            ..Default::default()
        });

        assert_eq!(prescription.medication, "Amoxicillin");
        assert_eq!(prescription.dosage, "250mg");
        assert_eq!(prescription.refills, 2);
        assert_eq!(prescription.instructions, None);
    }

    #[test]
    fn null_clears_optional_fields() {
        let mut patient = sample_patient();
        let changes: PatientChanges =
            serde_json::from_str(r#"{"date_of_birth":null}"#).expect("decode");
        patient.apply(changes);
        assert_eq!(patient.date_of_birth, None);
        assert_eq!(patient.name, "Ada Lovelace");

        let mut prescription = sample_prescription();
        prescription.instructions = Some("with food".to_string());
        let changes: PrescriptionChanges =
            serde_json::from_str(r#"{"instructions":null}"#).expect("decode");
        prescription.apply(changes);
        assert_eq!(prescription.instructions, None);
    }

    #[test]
    fn absent_optional_fields_are_kept() {
        let mut patient = sample_patient();
        let changes: PatientChanges =
            serde_json::from_str(r#"{"name":"Augusta Ada King"}"#).expect("decode");
        patient.apply(changes);

        assert_eq!(patient.name, "Augusta Ada King");
        assert_eq!(patient.date_of_birth, Some(date!(1815 - 12 - 10)));
    }

    #[test]
    fn patients_serialize_birth_dates_as_iso_dates() {
        let json = serde_json::to_value(sample_patient()).expect("serialize");
        assert_eq!(json["date_of_birth"], "1815-12-10");

        let back: PatientRecord = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, sample_patient());
    }

    #[test]
    fn change_sets_reject_unknown_fields() {
        let err = serde_json::from_str::<PrescriptionChanges>(r#"{"id":"99"}"#)
            .expect_err("id is not assignable");
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn prescriptions_reference_patients() {
        let schema = PrescriptionRecord::schema();
        let patient_id = schema
            .columns
            .iter()
            .find(|column| column.name == "patient_id")
            .expect("patient_id column");

        assert_eq!(
            patient_id.to_sql(),
            "patient_id VARCHAR NOT NULL REFERENCES patients (id) ON DELETE CASCADE"
        );
        assert_eq!(all_schemas()[0].name, "patients");
    }

    #[test]
    fn records_serialize_timestamps_as_rfc3339() {
        let json = serde_json::to_value(sample_prescription()).expect("serialize");
        assert_eq!(json["issued_at"], "2024-03-01T09:30:00Z");
    }
}
