//! Document model.

use chrono::{DateTime, Utc};
use mdsync_storage::DocumentEntry;
use serde::{Deserialize, Serialize};

/// Document type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Markdown text.
    #[default]
    Markdown,
}

/// One note as known to the cache.
///
/// `id` is the absolute path reported by the backend and never changes; a
/// rename produces a new document with a new id.
///
/// `synced` says the cached `content` matches what the backend last
/// returned; `saved` says the editor buffer matches `content`. When both
/// hold, buffer, cache, and backend agree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Primary key, derived from the absolute path.
    pub id: String,
    /// File name.
    pub name: String,
    /// Name of the containing directory.
    pub dir: String,
    /// Absolute path.
    pub path: String,
    /// Path relative to the documents root.
    pub relative_path: String,
    /// Type tag.
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    /// Last content known to the cache.
    pub content: String,
    /// Last modification time reported by the backend.
    pub modified: Option<DateTime<Utc>>,
    /// Cache content matches the backend.
    pub synced: bool,
    /// Editor buffer matches the cache content.
    pub saved: bool,
}

impl Document {
    /// Builds a document from backend metadata.
    ///
    /// Content starts empty with `synced = false` and `saved = true`, the
    /// state of a freshly listed document that has not been opened.
    pub fn from_entry(entry: DocumentEntry) -> Self {
        let modified = entry
            .modified
            .as_deref()
            .and_then(|m| DateTime::parse_from_rfc3339(m).ok())
            .map(|m| m.with_timezone(&Utc));
        let relative_path = entry
            .file_relative_path
            .unwrap_or_else(|| entry.file_name.clone());

        Self {
            id: entry.file_path.clone(),
            name: entry.file_name,
            dir: entry.file_dir.unwrap_or_default(),
            path: entry.file_path,
            relative_path,
            kind: DocumentKind::Markdown,
            content: String::new(),
            modified,
            synced: false,
            saved: true,
        }
    }

    /// Copies metadata from `other`, keeping this document's content and
    /// sync flags.
    pub fn merge_metadata(&mut self, other: Document) {
        self.name = other.name;
        self.dir = other.dir;
        self.path = other.path;
        self.relative_path = other.relative_path;
        self.kind = other.kind;
        self.modified = other.modified;
    }
}

/// Partial update applied by [`DocumentCache::patch`](crate::DocumentCache::patch).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentPatch {
    /// New content.
    pub content: Option<String>,
    /// New `synced` flag.
    pub synced: Option<bool>,
    /// New `saved` flag.
    pub saved: Option<bool>,
}

impl DocumentPatch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the content.
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Sets the `synced` flag.
    pub fn synced(mut self, synced: bool) -> Self {
        self.synced = Some(synced);
        self
    }

    /// Sets the `saved` flag.
    pub fn saved(mut self, saved: bool) -> Self {
        self.saved = Some(saved);
        self
    }

    /// Returns true if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.synced.is_none() && self.saved.is_none()
    }

    pub(crate) fn apply(self, doc: &mut Document) {
        if let Some(content) = self.content {
            doc.content = content;
        }
        if let Some(synced) = self.synced {
            doc.synced = synced;
        }
        if let Some(saved) = self.saved {
            doc.saved = saved;
        }
    }
}
