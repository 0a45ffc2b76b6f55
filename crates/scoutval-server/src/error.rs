// Error types surfaced at the HTTP boundary, with their status mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use scoutval_core::storage::StorageError;
use scoutval_import::ParseError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Failures of the import endpoint. Only `Validation` is the caller's fault.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("{0}")]
    Validation(String),

    #[error("Failed to download file: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to parse CSV: {0}")]
    Parse(#[from] ParseError),

    #[error("{0}")]
    Internal(String),
}

impl ImportError {
    pub fn status(&self) -> StatusCode {
        match self {
            ImportError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ImportError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            error!("Error processing request: {message}");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Failures of the read and prediction routes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("missing x-user-id header")]
    Unauthorized,

    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = self.to_string();
        if status.is_server_error() {
            error!("Request failed: {message}");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}
