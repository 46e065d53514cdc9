//! Error types for the cache store and server
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::backend::BackendError;

// == Cache Error Enum ==
/// Unified error type for the cache store and server.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Counter operation on a value that is not an integer
    #[error("Value is not an integer: {0}")]
    NotAnInteger(String),

    /// Value could not be converted to a storable form
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Stored bytes are not a valid entry encoding
    #[error("Corrupt entry: {0}")]
    CorruptEntry(String),

    /// Backing store primitive failed
    #[error("Backend failure: {0}")]
    Backend(#[from] BackendError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::NotAnInteger(_) | CacheError::Serialization(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            CacheError::Backend(BackendError::OutOfSpace { .. }) => StatusCode::INSUFFICIENT_STORAGE,
            CacheError::CorruptEntry(_) | CacheError::Backend(_) | CacheError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache store.
pub type Result<T> = std::result::Result<T, CacheError>;
