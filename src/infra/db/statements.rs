//! SQL for the generic record store, built from [`Record::columns`].

use sqlx::{Postgres, QueryBuilder};

use crate::domain::record::Record;

fn column_names<E: Record>() -> Vec<&'static str> {
    E::columns().into_iter().map(|column| column.name).collect()
}

pub(super) fn select<E: Record>() -> QueryBuilder<'static, Postgres> {
    QueryBuilder::new(format!(
        "SELECT {} FROM {}",
        column_names::<E>().join(", "),
        E::TABLE
    ))
}

pub(super) fn select_by_id<E: Record>(id: &str) -> QueryBuilder<'static, Postgres> {
    let mut qb = select::<E>();
    qb.push(" WHERE id = ");
    qb.push_bind(id.to_string());
    qb
}

pub(super) fn select_all<E: Record>() -> QueryBuilder<'static, Postgres> {
    let mut qb = select::<E>();
    qb.push(" ORDER BY id");
    qb
}

pub(super) fn insert<E: Record>(record: &E) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!(
        "INSERT INTO {} ({}) VALUES (",
        E::TABLE,
        column_names::<E>().join(", ")
    ));
    {
        let mut values = qb.separated(", ");
        record.push_values(&mut values);
    }
    qb.push(")");
    qb
}

/// Insert, or overwrite every non-key column of the row with the same id.
pub(super) fn upsert<E: Record>(record: &E) -> QueryBuilder<'static, Postgres> {
    let mut qb = insert(record);
    let assignments: Vec<String> = column_names::<E>()
        .into_iter()
        .filter(|name| *name != "id")
        .map(|name| format!("{name} = EXCLUDED.{name}"))
        .collect();

    if assignments.is_empty() {
        qb.push(" ON CONFLICT (id) DO NOTHING");
    } else {
        qb.push(" ON CONFLICT (id) DO UPDATE SET ");
        qb.push(assignments.join(", "));
    }
    qb
}

pub(super) fn delete<E: Record>(record: &E) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("DELETE FROM {} WHERE id = ", E::TABLE));
    qb.push_bind(record.id().to_string());
    qb
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::domain::entities::{PatientRecord, PrescriptionRecord};

    fn patient() -> PatientRecord {
        PatientRecord {
            id: "1".to_string(),
            name: "Ada Lovelace".to_string(),
            date_of_birth: None,
            created_at: datetime!(2024-01-15 12:00 UTC),
        }
    }

    #[test]
    fn select_by_id_binds_the_key() {
        let qb = select_by_id::<PatientRecord>("1");
        assert_eq!(
            qb.sql(),
            "SELECT id, name, date_of_birth, created_at FROM patients WHERE id = $1"
        );
    }

    #[test]
    fn select_all_is_ordered() {
        let qb = select_all::<PrescriptionRecord>();
        assert_eq!(
            qb.sql(),
            "SELECT id, patient_id, medication, dosage, instructions, refills, issued_at \
             FROM prescriptions ORDER BY id"
        );
    }

    #[test]
    fn insert_binds_every_column() {
        let qb = insert(&patient());
        assert_eq!(
            qb.sql(),
            "INSERT INTO patients (id, name, date_of_birth, created_at) VALUES ($1, $2, $3, $4)"
        );
    }

    #[test]
    fn upsert_overwrites_non_key_columns() {
        let qb = upsert(&patient());
        assert_eq!(
            qb.sql(),
            "INSERT INTO patients (id, name, date_of_birth, created_at) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, \
             date_of_birth = EXCLUDED.date_of_birth, created_at = EXCLUDED.created_at"
        );
    }

    #[test]
    fn delete_targets_the_id() {
        let qb = delete(&patient());
        assert_eq!(qb.sql(), "DELETE FROM patients WHERE id = $1");
    }
}
