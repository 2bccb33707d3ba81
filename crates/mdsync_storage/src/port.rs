//! Persistence port trait definition.

use crate::error::PortResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Metadata for one document as reported by a backend.
///
/// Field names follow the boundary's camelCase JSON shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEntry {
    /// File name including extension.
    pub file_name: String,
    /// Absolute path; documents are keyed by this value.
    pub file_path: String,
    /// Path relative to the documents root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_relative_path: Option<String>,
    /// Name of the directory holding the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_dir: Option<String>,
    /// Document type tag (`markdown`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    /// Last modification time, RFC 3339.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

impl DocumentEntry {
    /// Creates an entry with only the required fields set.
    pub fn new(file_name: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            file_path: file_path.into(),
            file_relative_path: None,
            file_dir: None,
            file_type: None,
            modified: None,
        }
    }

    /// Sets the relative path.
    pub fn with_relative_path(mut self, relative_path: impl Into<String>) -> Self {
        self.file_relative_path = Some(relative_path.into());
        self
    }

    /// Sets the directory name.
    pub fn with_dir(mut self, dir: impl Into<String>) -> Self {
        self.file_dir = Some(dir.into());
        self
    }

    /// Sets the type tag.
    pub fn with_type(mut self, file_type: impl Into<String>) -> Self {
        self.file_type = Some(file_type.into());
        self
    }

    /// Sets the modification time.
    pub fn with_modified(mut self, modified: impl Into<String>) -> Self {
        self.modified = Some(modified.into());
        self
    }
}

/// A file-like document backend addressed by relative path.
///
/// Every call may suspend. Failures follow the response convention: a
/// backend that wants the caller to re-issue a call returns
/// [`PortError::Rejected`](crate::PortError::Rejected) with `retryable`
/// set; a final failure leaves it unset.
///
/// # Implementors
///
/// - [`super::InMemoryPersistence`] - For testing, with fault injection
/// - [`super::FsPersistence`] - Documents directory on the local file system
#[async_trait]
pub trait PersistencePort: Send + Sync {
    /// Lists metadata for every document under the root.
    async fn list_all(&self) -> PortResult<Vec<DocumentEntry>>;

    /// Fetches metadata for the document at `relative_path`.
    async fn fetch_one(&self, relative_path: &str) -> PortResult<DocumentEntry>;

    /// Reads the full content of the document at `relative_path`.
    async fn read(&self, relative_path: &str) -> PortResult<String>;

    /// Writes `content` to `relative_path`, creating the document if needed.
    async fn write(&self, relative_path: &str, content: &str) -> PortResult<()>;

    /// Removes the document at `relative_path`.
    async fn remove(&self, relative_path: &str) -> PortResult<()>;

    /// Renames the document at `relative_path` to `new_name` in the same
    /// directory.
    async fn rename(&self, relative_path: &str, new_name: &str) -> PortResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_serializes_camel_case_and_skips_absent_fields() {
        let entry = DocumentEntry::new("notes.md", "/home/.mediocre/notes.md")
            .with_modified("2024-01-01T00:00:00Z");
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["fileName"], "notes.md");
        assert_eq!(json["filePath"], "/home/.mediocre/notes.md");
        assert_eq!(json["modified"], "2024-01-01T00:00:00Z");
        assert!(json.get("fileRelativePath").is_none());
        assert!(json.get("fileDir").is_none());
    }

    #[test]
    fn entry_accepts_minimal_json() {
        let entry: DocumentEntry =
            serde_json::from_str(r#"{"fileName":"a.md","filePath":"/r/a.md"}"#).unwrap();
        assert_eq!(entry, DocumentEntry::new("a.md", "/r/a.md"));
    }
}
