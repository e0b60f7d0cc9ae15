use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Failure taxonomy shared by the workflow, the stores and the extractor.
///
/// Every variant is recoverable at the request boundary: handlers convert it
/// into a JSON notice with the matching status code, log it, and the process
/// keeps serving.
#[derive(Debug, thiserror::Error)]
pub enum FaceError {
    /// No face, more than one face, or the embedding model failed internally.
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("storage unavailable: {0}")]
    Storage(String),
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

impl FaceError {
    pub fn status(&self) -> StatusCode {
        match self {
            FaceError::ExtractionFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            FaceError::Validation(_) => StatusCode::BAD_REQUEST,
            FaceError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            FaceError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for FaceError {
    fn into_response(self) -> Response {
        tracing::warn!("request failed: {}", self);
        let body = serde_json::json!({
            "status": "error",
            "message": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}

impl From<rusqlite::Error> for FaceError {
    fn from(e: rusqlite::Error) -> Self {
        FaceError::Storage(e.to_string())
    }
}
