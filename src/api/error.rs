use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::ListingKind;
use crate::store::StoreError;

/// Error bodies carry a user-facing `message` and the internal `error` detail.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{detail}")]
    NotFound { message: String, detail: String },
    #[error("{0}")]
    Corrupt(String),
    #[error("{0}")]
    Storage(String),
    #[error("unknown listing kind: {0}")]
    InvalidKind(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Refresh(String),
}

impl ApiError {
    pub fn listings(err: StoreError) -> Self {
        Self::from_store(err, "No listings available yet, run a refresh first")
    }

    pub fn reviews(err: StoreError) -> Self {
        Self::from_store(err, "No restaurant reviews available")
    }

    fn from_store(err: StoreError, not_found: &str) -> Self {
        match err {
            StoreError::NotFound(_) => ApiError::NotFound {
                message: not_found.to_string(),
                detail: err.to_string(),
            },
            StoreError::Corrupt { .. } => ApiError::Corrupt(err.to_string()),
            other => ApiError::Storage(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = self.to_string();
        let (status, body) = match self {
            ApiError::NotFound { message, .. } => (
                StatusCode::NOT_FOUND,
                json!({ "message": message, "error": detail }),
            ),
            ApiError::Corrupt(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "message": "Stored data could not be read", "error": detail }),
            ),
            ApiError::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "message": "Storage error", "error": detail }),
            ),
            ApiError::InvalidKind(_) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "message": "Invalid listing kind",
                    "error": detail,
                    "validKinds": ListingKind::valid_values(),
                }),
            ),
            ApiError::BadRequest(_) => (
                StatusCode::BAD_REQUEST,
                json!({ "message": detail.clone(), "error": detail }),
            ),
            ApiError::Refresh(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "message": "Refresh failed", "error": detail }),
            ),
        };

        (status, Json(body)).into_response()
    }
}
