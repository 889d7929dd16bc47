//! Declarative table definitions.
//!
//! Records describe their columns with [`ColumnDef`]; [`TableSchema`] renders
//! them to `CREATE TABLE IF NOT EXISTS` statements for bootstrap. Nothing here
//! touches a database.

use std::fmt::Write as _;

/// Column type used for primary keys and for columns referencing them.
pub const KEY_TYPE: &str = "VARCHAR";

/// Foreign-key constraint attached to a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub table: &'static str,
    pub column: &'static str,
    /// Extra constraint clauses, e.g. `ON DELETE CASCADE`.
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub sql_type: &'static str,
    pub nullable: bool,
    pub primary_key: bool,
    pub references: Option<ForeignKey>,
    /// Extra column clauses, e.g. `DEFAULT 0`.
    pub options: Vec<String>,
}

impl ColumnDef {
    /// A `NOT NULL` column of the given SQL type.
    pub fn new(name: &'static str, sql_type: &'static str) -> Self {
        Self {
            name,
            sql_type,
            nullable: false,
            primary_key: false,
            references: None,
            options: Vec::new(),
        }
    }

    /// The string-typed primary key column.
    pub fn primary_key(name: &'static str) -> Self {
        Self {
            primary_key: true,
            ..Self::new(name, KEY_TYPE)
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_option(mut self, clause: impl Into<String>) -> Self {
        self.options.push(clause.into());
        self
    }

    /// Render the column as it appears inside `CREATE TABLE (...)`.
    pub fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type);
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        } else if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(fk) = &self.references {
            let _ = write!(sql, " REFERENCES {} ({})", fk.table, fk.column);
            for clause in &fk.options {
                sql.push(' ');
                sql.push_str(clause);
            }
        }
        for clause in &self.options {
            sql.push(' ');
            sql.push_str(clause);
        }
        sql
    }
}

/// Options for [`reference_col`]. Defaults to a non-null reference to `id`.
#[derive(Debug, Clone)]
pub struct ReferenceOptions {
    pub nullable: bool,
    pub pk_name: &'static str,
    pub foreign_key: Vec<String>,
    pub column: Vec<String>,
}

impl Default for ReferenceOptions {
    fn default() -> Self {
        Self {
            nullable: false,
            pk_name: "id",
            foreign_key: Vec::new(),
            column: Vec::new(),
        }
    }
}

/// Column holding a foreign key to `table`'s primary key.
///
/// ```
/// use rxledger::domain::schema::{ReferenceOptions, reference_col};
///
/// let column = reference_col("patient_id", "patients", ReferenceOptions::default());
/// assert_eq!(column.to_sql(), "patient_id VARCHAR NOT NULL REFERENCES patients (id)");
/// ```
pub fn reference_col(
    name: &'static str,
    table: &'static str,
    options: ReferenceOptions,
) -> ColumnDef {
    let ReferenceOptions {
        nullable,
        pk_name,
        foreign_key,
        column,
    } = options;

    ColumnDef {
        name,
        sql_type: KEY_TYPE,
        nullable,
        primary_key: false,
        references: Some(ForeignKey {
            table,
            column: pk_name,
            options: foreign_key,
        }),
        options: column,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn new(name: &'static str, columns: Vec<ColumnDef>) -> Self {
        Self { name, columns }
    }

    pub fn create_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|column| format!("    {}", column.to_sql()))
            .collect::<Vec<_>>()
            .join(",\n");
        format!("CREATE TABLE IF NOT EXISTS {} (\n{}\n)", self.name, columns)
    }
}
