//! Domain error types for ACL resolution and editing.

use thiserror::Error;

/// Domain-specific errors for ACL operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// No entries match the object identity (optionally filtered by
    /// security identities).
    #[error("{message}")]
    NotFound { message: String },

    /// An entry index lies outside the valid interval of its bucket.
    #[error("{message}")]
    OutOfBounds { message: String },

    /// Unknown field key, non-integral mask, malformed identity or an
    /// ACL without persisted id handed to the cache.
    #[error("{message}")]
    InvalidArgument { message: String },

    /// An entry record does not belong to the ACL being constructed.
    #[error("type mismatch: expected entries of '{expected}', found '{found}'")]
    TypeMismatch { expected: String, found: String },

    /// Depth limit exceeded while resolving the parent chain.
    #[error("depth limit exceeded (max: {max_depth})")]
    DepthLimitExceeded { max_depth: u32 },

    /// Timeout during resolution.
    #[error("timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Failure reported by the persistence collaborator.
    #[error("storage error: {message}")]
    Storage { message: String },

    /// ACL could not be encoded or decoded.
    #[error("serialization error: {message}")]
    Serialization { message: String },
}

impl DomainError {
    /// Returns true for the `NotFound` kind.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DomainError::NotFound { .. })
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        DomainError::InvalidArgument {
            message: message.into(),
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
