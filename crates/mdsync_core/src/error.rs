//! Error types for mdsync core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the durable parts of the core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// I/O error on the settings file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Settings file could not be encoded or decoded.
    #[error("settings format error: {0}")]
    Json(#[from] serde_json::Error),
}
