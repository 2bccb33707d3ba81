//! Pre-write conflict detection.
//!
//! Before a save writes, the backend copy is re-read and compared with the
//! content the cache last saw. Any difference means someone else changed
//! the file and the write is refused. This is check-then-act: a change
//! landing between the re-read and the write is not caught.

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Message shown when a save is refused.
pub const CONFLICT_MESSAGE: &str = "Content on file system is changed! Please reload the app";

/// The backend copy of a document differs from the cached snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "{} ({path}: backend {backend_digest:.12}, cache {cached_digest:.12})",
    CONFLICT_MESSAGE
)]
pub struct Conflict {
    /// Relative path of the document.
    pub path: String,
    /// SHA-256 of the backend content, hex.
    pub backend_digest: String,
    /// SHA-256 of the cached content, hex.
    pub cached_digest: String,
}

/// Compares backend content with the cache's last-known content.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictDetector;

impl ConflictDetector {
    /// Returns true if the two contents differ.
    pub fn conflict(backend_content: &str, cached_content: &str) -> bool {
        backend_content != cached_content
    }

    /// Fails with [`Conflict`] if the contents differ.
    pub fn check(path: &str, backend_content: &str, cached_content: &str) -> Result<(), Conflict> {
        if !Self::conflict(backend_content, cached_content) {
            return Ok(());
        }
        Err(Conflict {
            path: path.to_string(),
            backend_digest: digest(backend_content),
            cached_digest: digest(cached_content),
        })
    }
}

/// Hex SHA-256 of `text`.
pub fn digest(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}
