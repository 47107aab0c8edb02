use thiserror::Error;

use crate::actor_framework::FrameworkError;

/// Errors that can occur during user and wallet operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum UserError {
    #[error("User not found: {0}")]
    NotFound(String),
    #[error("User already exists: {0}")]
    AlreadyExists(String),
    #[error("Insufficient points: requested {requested}, available {available}")]
    InsufficientPoints { requested: u64, available: u64 },
    #[error("User validation error: {0}")]
    ValidationError(String),
    #[error("User store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<FrameworkError> for UserError {
    fn from(error: FrameworkError) -> Self {
        match error {
            FrameworkError::NotFound(id) => UserError::NotFound(id),
            FrameworkError::AlreadyExists(id) => UserError::AlreadyExists(id),
            FrameworkError::Rejected(reason) => UserError::ValidationError(reason),
            other => UserError::StoreUnavailable(other.to_string()),
        }
    }
}
