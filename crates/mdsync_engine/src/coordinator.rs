//! Document operation coordinator.
//!
//! Every operation runs as Idle -> Pending -> Fulfilled | Rejected. The
//! kind's busy flag is held by a guard for the whole run and its last error
//! is cleared on dispatch and set on rejection. Workspace locks are taken
//! only between port calls.

use crate::autosync::AutoSyncTrigger;
use crate::cancel::CancelToken;
use crate::config::RetryConfig;
use crate::error::{SyncError, SyncResult};
use crate::retry::RetryPolicy;
use mdsync_core::{
    AppContext, ConflictDetector, Document, DocumentPatch, Formatter, Identity, OperationKind,
};
use mdsync_storage::PersistencePort;
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runs list/open/save/add/delete/rename against a persistence backend and
/// keeps the shared [`AppContext`] consistent with it.
pub struct SyncCoordinator {
    ctx: Arc<AppContext>,
    persistence: Arc<dyn PersistencePort>,
    retry: RetryPolicy,
    formatter: Arc<dyn Formatter>,
    save_listener: RwLock<Option<AutoSyncTrigger>>,
}

impl std::fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl SyncCoordinator {
    /// Creates a coordinator with default retry settings and no formatting.
    pub fn new(ctx: Arc<AppContext>, persistence: Arc<dyn PersistencePort>) -> Self {
        Self {
            ctx,
            persistence,
            retry: RetryPolicy::default(),
            formatter: Arc::new(Identity),
            save_listener: RwLock::new(None),
        }
    }

    /// Sets the retry configuration for persistence calls.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = RetryPolicy::new(retry);
        self
    }

    /// Sets the formatter applied on save.
    pub fn with_formatter(mut self, formatter: impl Formatter + 'static) -> Self {
        self.formatter = Arc::new(formatter);
        self
    }

    /// Returns the shared context.
    pub fn context(&self) -> &Arc<AppContext> {
        &self.ctx
    }

    /// Notifies `trigger` after every successful save.
    pub fn set_save_listener(&self, trigger: Option<AutoSyncTrigger>) {
        *self.save_listener.write() = trigger;
    }

    /// Returns the selected document, if it still exists.
    pub fn selected(&self) -> Option<Document> {
        self.ctx.selected()
    }

    /// Records editor input for the selected document.
    ///
    /// The selected document's `saved` flag follows whether `text` equals its
    /// cached content.
    pub fn mark_edited(&self, text: impl Into<String>) {
        let text = text.into();
        self.ctx.update(|ws| {
            let selected = ws
                .selected_document()
                .map(|doc| (doc.id.clone(), doc.content == text));
            if let Some((id, unchanged)) = selected {
                ws.cache.patch(&id, DocumentPatch::new().saved(unchanged));
            }
            ws.editor = text;
        });
    }

    /// Replaces the cache with the backend listing.
    ///
    /// The selected document, if still listed, keeps its cached content and
    /// `synced`/`saved` flags.
    pub async fn list_all(&self) -> SyncResult<Vec<Document>> {
        self.list_all_with(&CancelToken::new()).await
    }

    /// Like [`list_all`](Self::list_all), but discards the result and leaves
    /// the cache untouched if `cancel` fires before the listing returns.
    pub async fn list_all_with(&self, cancel: &CancelToken) -> SyncResult<Vec<Document>> {
        self.track(OperationKind::ListAll, async {
            let entries = self
                .retry
                .run("list_all", || self.persistence.list_all())
                .await?;
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            let docs: Vec<_> = entries.into_iter().map(Document::from_entry).collect();
            info!(count = docs.len(), "document listing refreshed");
            self.ctx.update(|ws| {
                // The open document keeps its content and flags so the
                // editor buffer stays comparable to it.
                let open = ws.selected_document().cloned();
                ws.cache.set_all(docs);
                if let Some(open) = open {
                    let patch = DocumentPatch::new()
                        .content(open.content)
                        .synced(open.synced)
                        .saved(open.saved);
                    ws.cache.patch(&open.id, patch);
                }
            });
            Ok(self.ctx.documents())
        })
        .await
    }

    /// Refreshes one document's metadata.
    pub async fn fetch_one(&self, relative_path: &str) -> SyncResult<Document> {
        self.track(OperationKind::FetchOne, async {
            if relative_path.trim().is_empty() {
                return Err(SyncError::validation("relative path is empty"));
            }
            let entry = self
                .retry
                .run("fetch_one", || self.persistence.fetch_one(relative_path))
                .await?;
            let doc = Document::from_entry(entry);
            let id = doc.id.clone();
            self.ctx.update(|ws| {
                ws.cache.upsert(doc);
                ws.cache.get(&id).cloned()
            })
            .ok_or_else(|| SyncError::not_found(id))
        })
        .await
    }

    /// Loads a document's content, selects it, and fills the editor.
    ///
    /// A document already in sync is served from the cache.
    pub async fn open(&self, id: &str) -> SyncResult<String> {
        self.track(OperationKind::Open, async {
            let (relative_path, cached) = self
                .ctx
                .read(|ws| {
                    ws.cache.get(id).map(|doc| {
                        let cached = doc.synced.then(|| doc.content.clone());
                        (doc.relative_path.clone(), cached)
                    })
                })
                .ok_or_else(|| SyncError::not_found(id))?;

            let content = match cached {
                Some(content) => {
                    debug!(id, "open served from cache");
                    content
                }
                None => {
                    self.retry
                        .run("read", || self.persistence.read(&relative_path))
                        .await?
                }
            };

            self.ctx.update(|ws| {
                let patch = DocumentPatch::new()
                    .content(content.clone())
                    .synced(true)
                    .saved(true);
                if !ws.cache.patch(id, patch) {
                    return Err(SyncError::not_found(id));
                }
                ws.selected = Some(id.to_string());
                ws.editor = content.clone();
                Ok(())
            })?;
            Ok(content)
        })
        .await
    }

    /// Formats the editor buffer and writes it to the selected document.
    ///
    /// The backend copy is re-read first; if it differs from the cached
    /// content the save fails with a conflict and nothing is written.
    pub async fn save(&self) -> SyncResult<Document> {
        let saved = self
            .track(OperationKind::Save, async {
                let (id, relative_path, cached, buffer) = self
                    .ctx
                    .read(|ws| {
                        ws.selected_document().map(|doc| {
                            (
                                doc.id.clone(),
                                doc.relative_path.clone(),
                                doc.content.clone(),
                                ws.editor.clone(),
                            )
                        })
                    })
                    .ok_or_else(|| SyncError::validation("no document selected"))?;

                let formatted = self.formatter.format(&buffer);
                let on_backend = self
                    .retry
                    .run("read", || self.persistence.read(&relative_path))
                    .await?;
                ConflictDetector::check(&relative_path, &on_backend, &cached)?;

                self.retry
                    .run("write", || self.persistence.write(&relative_path, &formatted))
                    .await?;

                self.ctx.update(|ws| {
                    ws.cache.patch(
                        &id,
                        DocumentPatch::new()
                            .content(formatted.clone())
                            .synced(true)
                            .saved(true),
                    );
                    if ws.selected.as_deref() == Some(id.as_str()) {
                        ws.editor = formatted;
                    }
                });
                info!(path = %relative_path, "document saved");
                Ok((id, relative_path))
            })
            .await?;

        let (id, relative_path) = saved;
        if let Err(e) = self.fetch_one(&relative_path).await {
            warn!(path = %relative_path, error = %e, "metadata refresh after save failed");
        }
        if let Some(trigger) = self.save_listener.read().as_ref() {
            trigger.request();
        }
        self.ctx
            .document(&id)
            .ok_or_else(|| SyncError::not_found(id))
    }

    /// Creates an empty document and opens it.
    pub async fn add(&self, file_name: &str) -> SyncResult<Document> {
        self.track(OperationKind::Add, async {
            if file_name.trim().is_empty() {
                return Err(SyncError::validation("file name is empty"));
            }
            self.retry
                .run("write", || self.persistence.write(file_name, ""))
                .await?;
            let doc = self.fetch_one(file_name).await?;
            self.open(&doc.id).await?;
            self.ctx
                .document(&doc.id)
                .ok_or_else(|| SyncError::not_found(doc.id))
        })
        .await
    }

    /// Removes a document from the backend and the cache.
    ///
    /// If it was selected, the selection and the editor buffer are cleared.
    pub async fn delete(&self, id: &str) -> SyncResult<()> {
        self.track(OperationKind::Delete, async {
            let relative_path = self.relative_path(id)?;
            self.retry
                .run("remove", || self.persistence.remove(&relative_path))
                .await?;
            self.ctx.update(|ws| {
                ws.cache.remove(id);
                if ws.selected.as_deref() == Some(id) {
                    ws.selected = None;
                }
                if ws.selected_id().is_none() {
                    ws.editor.clear();
                }
            });
            info!(path = %relative_path, "document deleted");
            Ok(())
        })
        .await
    }

    /// Renames a document in its directory, then reloads the listing.
    pub async fn rename(&self, id: &str, new_name: &str) -> SyncResult<()> {
        self.track(OperationKind::Rename, async {
            if new_name.trim().is_empty() {
                return Err(SyncError::validation("new name is empty"));
            }
            let relative_path = self.relative_path(id)?;
            self.retry
                .run("rename", || self.persistence.rename(&relative_path, new_name))
                .await?;
            info!(from = %relative_path, to = new_name, "document renamed");
            self.list_all().await?;
            Ok(())
        })
        .await
    }

    fn relative_path(&self, id: &str) -> SyncResult<String> {
        self.ctx
            .read(|ws| ws.cache.get(id).map(|doc| doc.relative_path.clone()))
            .ok_or_else(|| SyncError::not_found(id))
    }

    async fn track<T>(
        &self,
        kind: OperationKind,
        operation: impl Future<Output = SyncResult<T>>,
    ) -> SyncResult<T> {
        let guard = self.ctx.operations().begin(kind);
        debug!(op = %kind, "operation dispatched");
        let result = operation.await;
        match &result {
            Ok(_) => debug!(op = %kind, "operation fulfilled"),
            Err(e) => {
                warn!(op = %kind, error = %e, "operation rejected");
                guard.fail(e.to_string());
            }
        }
        result
    }
}
