use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::ErrorReport;
use crate::application::repos::RepoError;

const SOURCE: &str = "infra::http::error";

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
}

/// Error returned by API handlers, rendered as `{"error": "<message>"}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    report: ErrorReport,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status,
            report: ErrorReport::from_message(SOURCE, status, message.clone()),
            message,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(what: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("{what} not found"))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        let status = match &err {
            RepoError::NotFound => StatusCode::NOT_FOUND,
            RepoError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            RepoError::Duplicate { .. } | RepoError::Integrity { .. } => StatusCode::CONFLICT,
            RepoError::Persistence(_) | RepoError::Timeout | RepoError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: err.to_string(),
            report: ErrorReport::from_error(SOURCE, status, &err),
        }
    }
}

/// Bodies that parse but do not fit the payload type are a plain 400; every
/// other rejection keeps its own status (415 without a JSON content type,
/// 413 for oversized bodies).
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = match &rejection {
            JsonRejection::JsonDataError(_) => StatusCode::BAD_REQUEST,
            _ => rejection.status(),
        };
        Self::new(status, rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.message,
        };
        let mut response = (self.status, Json(body)).into_response();
        self.report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_errors_map_to_statuses() {
        let cases = [
            (RepoError::NotFound, StatusCode::NOT_FOUND),
            (
                RepoError::Duplicate {
                    constraint: "patients_pkey".to_string(),
                },
                StatusCode::CONFLICT,
            ),
            (
                RepoError::InvalidInput {
                    message: "bad id".to_string(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                RepoError::Integrity {
                    message: "null value".to_string(),
                },
                StatusCode::CONFLICT,
            ),
            (RepoError::Timeout, StatusCode::INTERNAL_SERVER_ERROR),
            (
                RepoError::Persistence("connection reset".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn response_carries_report_for_logging() {
        let response = ApiError::from(RepoError::Timeout).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let report = response.extensions().get::<ErrorReport>().expect("report");
        assert_eq!(report.messages, ["database timeout"]);
    }
}
