use civic_storage::StorageError;
use civic_types::{ComplaintStatus, UserId};
use thiserror::Error;

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// The specific rule a rejected request broke.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("description has {words} words, at least {min} required")]
    DescriptionTooShort { words: usize, min: usize },

    #[error("{count} images attached, at least {min} required")]
    TooFewImages { count: usize, min: usize },

    #[error("{count} images attached, at most {max} allowed")]
    TooManyImages { count: usize, max: usize },

    #[error("image {reference} is {size_bytes} bytes, limit is {max_bytes}")]
    ImageTooLarge {
        reference: String,
        size_bytes: u64,
        max_bytes: u64,
    },

    #[error("attachment {reference} has type '{mime_type}', expected image/*")]
    NotAnImage { reference: String, mime_type: String },

    #[error("street must not be empty")]
    MissingStreet,

    #[error("location detail must not be empty")]
    MissingLocationDetail,

    #[error("resolution proof must not be empty when given")]
    EmptyProof,

    #[error("assignment requires an employee id")]
    MissingEmployee,

    #[error("user {0} is not an employee")]
    NotAnEmployee(UserId),

    #[error("{0}")]
    Invalid(String),
}

/// Lifecycle errors.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationFailure),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        from: ComplaintStatus,
        to: ComplaintStatus,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("store temporarily unavailable: {0}")]
    TransientStore(String),

    /// The store refused the write or returned a corrupt record; retrying
    /// the same request will not help.
    #[error("store failure: {0}")]
    Store(String),
}

impl From<StorageError> for LifecycleError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => LifecycleError::NotFound(what),
            StorageError::InvalidInput(msg) => {
                LifecycleError::Validation(ValidationFailure::Invalid(msg))
            }
            other if other.is_transient() => LifecycleError::TransientStore(other.to_string()),
            other => LifecycleError::Store(other.to_string()),
        }
    }
}
