//! JSON error responses for the API routes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use orchestrator::OrchestratorError;

/// Every error an API handler can return.
///
/// | Variant | Status | `error` |
/// |---------|--------|---------|
/// | `InvalidBody` | 400 | `invalid_body` |
/// | `InvalidInput` | 422 | `invalid_input` |
/// | `NotFound`, `UnknownTaskId` | 404 | `not_found` |
/// | `NotReady` | 409 | `not_ready` |
/// | `Failed` | 500 | `analysis_failed` |
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body was not a JSON parcel object.
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// The path segment is not a task id.
    #[error("task not found: {0}")]
    UnknownTaskId(String),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::UnknownTaskId(_) => StatusCode::NOT_FOUND,
            Self::Orchestrator(err) => match err {
                OrchestratorError::InvalidInput { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                OrchestratorError::NotFound { .. } => StatusCode::NOT_FOUND,
                OrchestratorError::NotReady { .. } => StatusCode::CONFLICT,
                OrchestratorError::Failed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        let body = match self {
            Self::InvalidBody(_) => json!({ "error": "invalid_body", "message": message }),
            Self::UnknownTaskId(_) => json!({ "error": "not_found", "message": message }),
            Self::Orchestrator(err) => match err {
                OrchestratorError::InvalidInput { missing } => json!({
                    "error": "invalid_input",
                    "message": message,
                    "missing_fields": missing,
                }),
                OrchestratorError::NotFound { .. } => {
                    json!({ "error": "not_found", "message": message })
                }
                OrchestratorError::NotReady {
                    status, progress, ..
                } => json!({
                    "error": "not_ready",
                    "message": message,
                    "status": status,
                    "progress": progress,
                }),
                OrchestratorError::Failed { failure, .. } => json!({
                    "error": "analysis_failed",
                    "message": message,
                    "failure": failure,
                }),
            },
        };
        (status, Json(body)).into_response()
    }
}
