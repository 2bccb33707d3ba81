//! CLI command implementations.

pub mod documents;
pub mod status;
pub mod sync;

use clap::ValueEnum;
use mdsync_core::{AppContext, Document, Formatter, SettingsStore};
use mdsync_engine::{CloudSyncEngine, EngineConfig, SyncCoordinator};
use mdsync_storage::{ActivityGate, FsPersistence, FsPersistenceConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Result type shared by the commands.
pub type CommandResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Output format for listing commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable lines.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Returns the user's home directory from the environment.
pub fn home_dir() -> CommandResult<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .ok_or_else(|| "home directory not set; pass --root and --settings".into())
}

/// Wiring for one CLI invocation.
///
/// The file-system backend and the git adapter share one activity gate so
/// a running sync turns document operations into retryable rejections.
pub struct Session {
    persistence: Arc<FsPersistence>,
    config: EngineConfig,
    /// Shared document and replication state.
    pub ctx: Arc<AppContext>,
    /// Document operations.
    pub coordinator: Arc<SyncCoordinator>,
    /// Replication operations.
    pub engine: Arc<CloudSyncEngine>,
}

impl Session {
    /// Opens the documents directory at `root` and loads settings.
    pub fn open(root: &Path, settings: &Path) -> CommandResult<Self> {
        let config = EngineConfig::new();
        let store = SettingsStore::new(settings);
        let ctx = Arc::new(AppContext::with_replication(store.load()?));

        let gate = ActivityGate::new();
        let persistence = Arc::new(
            FsPersistence::open(FsPersistenceConfig::new(root))?.with_gate(gate.clone()),
        );
        let replication = Arc::new(mdsync_engine::GitReplication::new(root).with_gate(gate));

        let coordinator = Arc::new(
            SyncCoordinator::new(Arc::clone(&ctx), persistence.clone())
                .with_retry(config.persistence_retry),
        );
        let engine = Arc::new(
            CloudSyncEngine::new(Arc::clone(&coordinator), replication)
                .with_config(&config)
                .with_settings(store),
        );
        debug!(root = %root.display(), settings = %settings.display(), "session opened");

        Ok(Self {
            persistence,
            config,
            ctx,
            coordinator,
            engine,
        })
    }

    /// Returns the documents directory.
    pub fn root(&self) -> &Path {
        self.persistence.root()
    }

    /// Returns a coordinator over the same context that formats on save.
    pub fn formatting(&self, formatter: impl Formatter + 'static) -> SyncCoordinator {
        SyncCoordinator::new(Arc::clone(&self.ctx), self.persistence.clone())
            .with_retry(self.config.persistence_retry)
            .with_formatter(formatter)
    }

    /// Loads the listing and finds `document` by id or relative path.
    pub async fn resolve(&self, document: &str) -> CommandResult<Document> {
        self.coordinator.list_all().await?;
        let found = self.ctx.read(|ws| {
            ws.cache
                .get(document)
                .or_else(|| ws.cache.find_by_relative_path(document))
                .cloned()
        });
        found.ok_or_else(|| format!("no such document: {document}").into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn resolve_accepts_id_or_relative_path() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("docs");
        let session = Session::open(&root, &dir.path().join("store.db.json")).unwrap();

        let added = session.coordinator.add("journal/day.md").await.unwrap();

        let by_path = session.resolve("journal/day.md").await.unwrap();
        assert_eq!(by_path.id, added.id);
        let by_id = session.resolve(&added.id).await.unwrap();
        assert_eq!(by_id.relative_path, "journal/day.md");
        assert!(session.resolve("missing.md").await.is_err());
    }

    #[tokio::test]
    async fn tidy_save_formats_content() {
        let dir = tempdir().unwrap();
        let session = Session::open(dir.path(), &dir.path().join(".store.json")).unwrap();
        session.coordinator.add("a.md").await.unwrap();

        let coordinator = session.formatting(Shout);
        let doc = session.resolve("a.md").await.unwrap();
        coordinator.open(&doc.id).await.unwrap();
        coordinator.mark_edited("text");
        let saved = coordinator.save().await.unwrap();
        assert_eq!(saved.content, "TEXT");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.md")).unwrap(),
            "TEXT"
        );
    }

    struct Shout;

    impl Formatter for Shout {
        fn format(&self, text: &str) -> String {
            text.to_uppercase()
        }
    }

    #[test]
    fn new_sessions_start_with_saved_settings() {
        let dir = tempdir().unwrap();
        let settings = dir.path().join("store.db.json");
        SettingsStore::new(&settings)
            .save(&mdsync_core::ReplicationConfig::git("url", "n", "e"))
            .unwrap();

        let session = Session::open(&dir.path().join("docs"), &settings).unwrap();
        assert!(session.engine.config().enabled);
    }
}
