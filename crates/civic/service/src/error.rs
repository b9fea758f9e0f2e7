//! Error types for civicd

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use civic_assignment::AssignmentError;
use civic_identity::IdentityError;
use civic_lifecycle::LifecycleError;
use civic_notify::NotifyError;
use civic_storage::StorageError;
use serde::Serialize;
use thiserror::Error;

/// Service-level errors raised while starting up
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server startup error
    #[error("Server error: {0}")]
    Server(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or unknown caller
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Caller's role may not perform the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Conflict
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Store could not complete the request in time
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::warn!(code, error = %self, "Request failed");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Validation(failure) => ApiError::Validation(failure.to_string()),
            LifecycleError::Unauthorized(reason) => ApiError::Forbidden(reason),
            err @ LifecycleError::InvalidTransition { .. } => ApiError::Conflict(err.to_string()),
            LifecycleError::NotFound(what) => ApiError::NotFound(what),
            LifecycleError::TransientStore(reason) => ApiError::Unavailable(reason),
            LifecycleError::Store(reason) => ApiError::Internal(reason),
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Validation(reason) => ApiError::Validation(reason),
            IdentityError::EmailTaken(email) => {
                ApiError::Conflict(format!("email already registered: {email}"))
            }
            IdentityError::NotFound(what) => ApiError::NotFound(what),
            IdentityError::Storage(err) => err.into(),
        }
    }
}

impl From<AssignmentError> for ApiError {
    fn from(err: AssignmentError) -> Self {
        match err {
            AssignmentError::Lifecycle(err) => err.into(),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => ApiError::NotFound(what),
            StorageError::Conflict(reason) => ApiError::Conflict(reason),
            StorageError::InvalidInput(reason) => ApiError::Validation(reason),
            err if err.is_transient() => ApiError::Unavailable(err.to_string()),
            err => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<NotifyError> for ApiError {
    fn from(err: NotifyError) -> Self {
        match err {
            NotifyError::NotFound(id) => ApiError::NotFound(format!("notification {id}")),
            err => ApiError::Internal(err.to_string()),
        }
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for service bootstrap
pub type ServiceResult<T> = Result<T, ServiceError>;
