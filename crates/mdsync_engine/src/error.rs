//! Error types for the sync engine.

use mdsync_core::{Conflict, CoreError};
use mdsync_storage::PortError;
use thiserror::Error;

/// Result type for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Broad classification of a [`SyncError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input or a precondition that does not hold.
    Validation,
    /// The referenced document is not cached.
    NotFound,
    /// The backend copy changed under the cache.
    Conflict,
    /// The backend asked for the call to be retried.
    Retryable,
    /// Retries ran out.
    Exhausted,
    /// The backend refused the call for good.
    Rejected,
    /// The caller withdrew interest.
    Cancelled,
    /// Settings could not be read or written.
    Storage,
    /// Anything outside the response convention.
    Unexpected,
}

/// Errors that can occur in engine operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Invalid input or unmet precondition.
    #[error("{0}")]
    Validation(String),

    /// Document is not in the cache.
    #[error("document not found: {0}")]
    NotFound(String),

    /// Save refused because the backend copy changed.
    #[error(transparent)]
    Conflict(#[from] Conflict),

    /// Backend answered with `retry = true` outside a retry policy.
    #[error("{0}")]
    Retryable(String),

    /// Every attempt answered with `retry = true`.
    #[error("maxRetries exceeded! ({attempts} attempts, last: {last_message})")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// Message of the final attempt.
        last_message: String,
    },

    /// Backend answered with `status = false, retry = false`.
    #[error("{0}")]
    Rejected(String),

    /// ListAll result discarded after cancellation.
    #[error("operation cancelled")]
    Cancelled,

    /// Durable settings error.
    #[error("settings error: {0}")]
    Storage(#[from] CoreError),

    /// Failure outside the response convention.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl SyncError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a not-found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Validation(_) => ErrorKind::Validation,
            SyncError::NotFound(_) => ErrorKind::NotFound,
            SyncError::Conflict(_) => ErrorKind::Conflict,
            SyncError::Retryable(_) => ErrorKind::Retryable,
            SyncError::Exhausted { .. } => ErrorKind::Exhausted,
            SyncError::Rejected(_) => ErrorKind::Rejected,
            SyncError::Cancelled => ErrorKind::Cancelled,
            SyncError::Storage(_) => ErrorKind::Storage,
            SyncError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }

    /// Returns true if re-issuing the failed call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Retryable(_))
    }
}

impl From<PortError> for SyncError {
    fn from(e: PortError) -> Self {
        match e {
            PortError::Rejected {
                message,
                retryable: true,
            } => SyncError::Retryable(message),
            PortError::Rejected { message, .. } => SyncError::Rejected(message),
            PortError::Unexpected(message) => SyncError::Unexpected(message),
        }
    }
}
