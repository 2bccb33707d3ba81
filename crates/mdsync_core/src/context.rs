//! Shared application state.

use crate::cache::DocumentCache;
use crate::document::Document;
use crate::ops::{OperationKind, OperationSnapshot, OperationStates};
use crate::settings::ReplicationConfig;
use crate::status::SyncStatus;
use parking_lot::RwLock;

/// Cache, selection, and editor buffer, locked together.
///
/// Keeping the three behind one lock lets an operation change them in a
/// single step, so readers never see a selection without its content.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    /// Cached documents.
    pub cache: DocumentCache,
    /// Selected document id, if any.
    pub selected: Option<String>,
    /// Text currently in the editor.
    pub editor: String,
}

impl Workspace {
    /// Returns the selected id if it still refers to a cached document.
    pub fn selected_id(&self) -> Option<&str> {
        self.selected
            .as_deref()
            .filter(|id| self.cache.contains(id))
    }

    /// Returns the selected document if it still exists.
    pub fn selected_document(&self) -> Option<&Document> {
        self.selected_id().and_then(|id| self.cache.get(id))
    }
}

/// Process-wide state shared by the coordinator and the cloud engine.
///
/// Constructed once and shared behind an `Arc`. Locks are short-lived and
/// must never be held across an `.await`.
#[derive(Debug, Default)]
pub struct AppContext {
    workspace: RwLock<Workspace>,
    operations: OperationStates,
    status: RwLock<SyncStatus>,
    replication: RwLock<ReplicationConfig>,
}

impl AppContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context seeded with durable replication settings.
    pub fn with_replication(replication: ReplicationConfig) -> Self {
        Self {
            replication: RwLock::new(replication),
            ..Self::default()
        }
    }

    /// Runs `f` with shared access to the workspace.
    pub fn read<R>(&self, f: impl FnOnce(&Workspace) -> R) -> R {
        f(&self.workspace.read())
    }

    /// Runs `f` with exclusive access to the workspace.
    pub fn update<R>(&self, f: impl FnOnce(&mut Workspace) -> R) -> R {
        f(&mut self.workspace.write())
    }

    /// Returns cached documents, newest first.
    pub fn documents(&self) -> Vec<Document> {
        self.read(|ws| ws.cache.list().into_iter().cloned().collect())
    }

    /// Returns one cached document.
    pub fn document(&self, id: &str) -> Option<Document> {
        self.read(|ws| ws.cache.get(id).cloned())
    }

    /// Returns the selected id, or `None` if it no longer exists.
    pub fn selected_id(&self) -> Option<String> {
        self.read(|ws| ws.selected_id().map(str::to_string))
    }

    /// Returns the selected document.
    pub fn selected(&self) -> Option<Document> {
        self.read(|ws| ws.selected_document().cloned())
    }

    /// Returns the editor buffer.
    pub fn editor_buffer(&self) -> String {
        self.read(|ws| ws.editor.clone())
    }

    /// Returns the operation tracker.
    pub fn operations(&self) -> &OperationStates {
        &self.operations
    }

    /// Returns true while an operation of `kind` is pending.
    pub fn is_busy(&self, kind: OperationKind) -> bool {
        self.operations.is_busy(kind)
    }

    /// Returns the last error of `kind`.
    pub fn last_error(&self, kind: OperationKind) -> Option<String> {
        self.operations.last_error(kind)
    }

    /// Returns busy flags and errors for every kind.
    pub fn operation_snapshots(&self) -> Vec<OperationSnapshot> {
        self.operations.snapshots()
    }

    /// Returns a copy of the replication status.
    pub fn status(&self) -> SyncStatus {
        self.status.read().clone()
    }

    /// Mutates the replication status.
    pub fn update_status<R>(&self, f: impl FnOnce(&mut SyncStatus) -> R) -> R {
        f(&mut self.status.write())
    }

    /// Returns the replication settings.
    pub fn replication(&self) -> ReplicationConfig {
        self.replication.read().clone()
    }

    /// Replaces the replication settings.
    pub fn set_replication(&self, config: ReplicationConfig) {
        *self.replication.write() = config;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdsync_storage::DocumentEntry;

    fn doc(name: &str) -> Document {
        Document::from_entry(DocumentEntry::new(name, format!("/r/{name}")))
    }

    #[test]
    fn stale_selection_reads_as_none() {
        let ctx = AppContext::new();
        ctx.update(|ws| {
            ws.cache.upsert(doc("a.md"));
            ws.selected = Some("/r/a.md".to_string());
        });
        assert_eq!(ctx.selected_id().as_deref(), Some("/r/a.md"));

        ctx.update(|ws| {
            ws.cache.remove("/r/a.md");
        });
        assert!(ctx.selected_id().is_none());
        assert!(ctx.selected().is_none());
    }

    #[test]
    fn replication_seeded_from_settings() {
        let ctx = AppContext::with_replication(ReplicationConfig::git("url", "n", "e"));
        assert!(ctx.replication().enabled);
        assert!(!ctx.status().is_syncing);
    }

    #[test]
    fn documents_come_back_in_listing_order() {
        let ctx = AppContext::new();
        ctx.update(|ws| {
            ws.cache.set_all(vec![doc("b.md"), doc("a.md")]);
        });
        let ids: Vec<_> = ctx.documents().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["/r/a.md", "/r/b.md"]);
    }
}
