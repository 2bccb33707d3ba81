//! Error types for port calls.

use thiserror::Error;

/// Result type for persistence and replication port calls.
pub type PortResult<T> = Result<T, PortError>;

/// Failure of a call across the backend boundary.
///
/// A backend that follows the response convention answers with
/// [`PortError::Rejected`], telling the caller whether re-issuing the same
/// call is safe. Anything else is [`PortError::Unexpected`] and is never
/// retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    /// The backend answered with `status = false`.
    #[error("{message}")]
    Rejected {
        /// Message reported by the backend.
        message: String,
        /// Whether the backend asked for the call to be retried.
        retryable: bool,
    },

    /// The call failed outside the response convention.
    #[error("unexpected backend failure: {0}")]
    Unexpected(String),
}

impl PortError {
    /// Creates a final rejection (`retry = false`).
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a rejection that asks the caller to retry.
    pub fn retry(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates an unexpected failure.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Returns true if the backend signalled that a retry is safe.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PortError::Rejected { retryable: true, .. })
    }

    /// Returns the backend message without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            PortError::Rejected { message, .. } => message,
            PortError::Unexpected(message) => message,
        }
    }
}

impl From<std::io::Error> for PortError {
    fn from(e: std::io::Error) -> Self {
        PortError::rejected(e.to_string())
    }
}

impl From<tokio::task::JoinError> for PortError {
    fn from(e: tokio::task::JoinError) -> Self {
        PortError::Unexpected(e.to_string())
    }
}
