//! Storage-specific error types.
//!
//! These errors describe persistence failures without any knowledge of the
//! resource pipeline. They convert into [`ResourceError`] at the storage boundary.

use crate::error::ResourceError;
use std::time::Duration;

/// Errors that can occur during storage operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    /// The requested item was not found
    #[error("Item not found: {id}")]
    NotFound { id: String },

    /// The stored item does not match the expected state (id or etag)
    #[error("Concurrent modification of {id}: expected {expected}, found {actual}")]
    Conflict {
        id: String,
        expected: String,
        actual: String,
    },

    /// An item with the same id already exists
    #[error("Item already exists: {id}")]
    AlreadyExists { id: String },

    /// The backend does not support the operation
    #[error("Operation '{operation}' is not implemented by this storage")]
    NotImplemented { operation: String },

    /// The backend is temporarily unavailable
    #[error("Storage unavailable: {message}")]
    Unavailable { message: String },

    /// The operation timed out inside the backend
    #[error("Storage operation '{operation}' timed out after {duration:?}")]
    Timeout { operation: String, duration: Duration },

    /// A caller supplied callback aborted the operation
    #[error("{0}")]
    Callback(Box<ResourceError>),

    /// Internal storage error
    #[error("Internal storage error: {message}")]
    Internal { message: String },
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn conflict(
        id: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            id: id.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn already_exists(id: impl Into<String>) -> Self {
        Self::AlreadyExists { id: id.into() }
    }

    pub fn not_implemented(operation: impl Into<String>) -> Self {
        Self::NotImplemented {
            operation: operation.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error means another writer got there first.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::AlreadyExists { .. })
    }
}

impl From<StorageError> for ResourceError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::NotFound { .. } => ResourceError::NotFound,
            StorageError::Conflict { .. } | StorageError::AlreadyExists { .. } => {
                ResourceError::Conflict
            }
            StorageError::NotImplemented { .. } => ResourceError::NotImplemented,
            StorageError::Timeout { .. } => ResourceError::DeadlineExceeded,
            StorageError::Callback(error) => *error,
            other @ (StorageError::Unavailable { .. } | StorageError::Internal { .. }) => {
                ResourceError::unknown(other)
            }
        }
    }
}
