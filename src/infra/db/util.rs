use crate::application::repos::RepoError;

/// Translate a driver error into the repository taxonomy, keyed on SQLSTATE.
pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) => {
            let code = db.code().map(|code| code.into_owned()).unwrap_or_default();
            classify(&code, db.message(), db.constraint())
        }
        other => RepoError::from_persistence(other),
    }
}

fn classify(code: &str, message: &str, constraint: Option<&str>) -> RepoError {
    match code {
        // unique_violation
        "23505" => RepoError::Duplicate {
            constraint: constraint.unwrap_or("unknown").to_string(),
        },
        // foreign_key_violation, invalid_text_representation
        "23503" | "22P02" => RepoError::InvalidInput {
            message: message.to_string(),
        },
        // query_canceled
        "57014" => RepoError::Timeout,
        code if code.starts_with("23") => RepoError::Integrity {
            message: message.to_string(),
        },
        _ => RepoError::from_persistence(message),
    }
}
