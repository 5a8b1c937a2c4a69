//! Storage error types.

use thiserror::Error;

/// Storage-specific errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Object identity row not found.
    #[error("object identity not found: {id}")]
    ObjectIdentityNotFound { id: i64 },

    /// Object identity row already exists for the (class, identifier) pair.
    #[error("object identity already exists: {class_type}:{identifier}")]
    ObjectIdentityAlreadyExists {
        class_type: String,
        identifier: String,
    },

    /// Entry not found.
    #[error("entry not found: {id}")]
    EntryNotFound { id: i64 },

    /// Re-parenting would make a row its own ancestor.
    #[error("object identity {id} cannot be placed under {parent_id}: hierarchy cycle")]
    HierarchyCycle { id: i64, parent_id: i64 },

    /// Row still has children and cannot be removed.
    #[error("object identity {id} still has {children} child object identities")]
    HasChildren { id: i64, children: usize },

    /// Invalid input error.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Internal error.
    #[error("internal storage error: {message}")]
    InternalError { message: String },
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
