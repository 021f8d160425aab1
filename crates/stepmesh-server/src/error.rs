//! Service error type and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::engine::ConversionFailure;
use crate::store::StoreError;
use crate::validator::ValidationError;

/// Errors a request can end with.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The upload or query was rejected before touching the filesystem.
    #[error("{0}")]
    Validation(String),

    /// Scratch storage failed.
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// The kernel could not produce a mesh.
    #[error("Conversion failed: {0}")]
    Conversion(String),

    /// No pending download under that name.
    #[error("File not found")]
    NotFound,

    /// The request body exceeded the configured cap.
    #[error("File too large. Maximum upload size is {limit} bytes")]
    PayloadTooLarge { limit: usize },
}

impl ServiceError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Io(_) | ServiceError::Conversion(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::NotFound => StatusCode::NOT_FOUND,
            ServiceError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

impl From<ConversionFailure> for ServiceError {
    fn from(err: ConversionFailure) -> Self {
        ServiceError::Conversion(err.to_string())
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ServiceError::NotFound,
            StoreError::Io(e) => ServiceError::Io(e),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}
