//! File-system persistence backend.

use crate::error::{PortError, PortResult};
use crate::gate::ActivityGate;
use crate::port::{DocumentEntry, PersistencePort};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use relative_path::RelativePath;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Configuration for [`FsPersistence`].
#[derive(Debug, Clone)]
pub struct FsPersistenceConfig {
    /// Documents directory. Created on open if missing.
    pub root: PathBuf,
    /// Create the root directory when it does not exist.
    pub create_root: bool,
}

impl FsPersistenceConfig {
    /// Creates a config for the given documents directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            create_root: true,
        }
    }

    /// Sets whether a missing root is created.
    pub fn with_create_root(mut self, create: bool) -> Self {
        self.create_root = create;
        self
    }
}

/// A persistence backend over a documents directory.
///
/// Relative paths are resolved under the root and may not leave it. Every
/// call enters the shared [`ActivityGate`] first, so a running replication
/// turns file operations into retryable rejections. Blocking I/O runs on
/// the tokio blocking pool.
///
/// # Example
///
/// ```no_run
/// use mdsync_storage::{FsPersistence, FsPersistenceConfig, PersistencePort};
///
/// # async fn demo() -> mdsync_storage::PortResult<()> {
/// let backend = FsPersistence::open(FsPersistenceConfig::new("/home/me/.mediocre/documents"))?;
/// backend.write("notes.md", "# Notes\n").await?;
/// for entry in backend.list_all().await? {
///     println!("{}", entry.file_path);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FsPersistence {
    root: PathBuf,
    gate: ActivityGate,
}

impl FsPersistence {
    /// Opens the documents directory described by `config`.
    ///
    /// # Errors
    ///
    /// Returns a rejection if the root cannot be created, or does not exist
    /// and `create_root` is off.
    pub fn open(config: FsPersistenceConfig) -> PortResult<Self> {
        if config.create_root {
            fs::create_dir_all(&config.root)?;
        } else if !config.root.is_dir() {
            return Err(PortError::rejected(format!(
                "documents directory not found: {}",
                config.root.display()
            )));
        }
        Ok(Self {
            root: config.root,
            gate: ActivityGate::new(),
        })
    }

    /// Replaces the activity gate with one shared with a replication adapter.
    pub fn with_gate(mut self, gate: ActivityGate) -> Self {
        self.gate = gate;
        self
    }

    /// Returns the activity gate.
    pub fn gate(&self) -> &ActivityGate {
        &self.gate
    }

    /// Returns the documents directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a relative path under the root.
    fn resolve(&self, relative_path: &str) -> PortResult<PathBuf> {
        if relative_path.starts_with(['/', '\\']) || Path::new(relative_path).is_absolute() {
            return Err(escape(relative_path));
        }
        let normalized = RelativePath::new(relative_path).normalize();
        if normalized
            .components()
            .any(|c| matches!(c, relative_path::Component::ParentDir))
        {
            return Err(escape(relative_path));
        }
        if normalized.as_str().is_empty() {
            return Err(PortError::rejected("relative path is empty"));
        }
        Ok(normalized.to_logical_path(&self.root))
    }

    async fn blocking<T, F>(&self, f: F) -> PortResult<T>
    where
        T: Send + 'static,
        F: FnOnce(PathBuf) -> PortResult<T> + Send + 'static,
    {
        let _guard = self.gate.enter_file_system()?;
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || f(root)).await?
    }
}

fn escape(relative_path: &str) -> PortError {
    PortError::rejected(format!(
        "path escapes the documents directory: {relative_path}"
    ))
}

fn entry_for(root: &Path, path: &Path, metadata: &fs::Metadata) -> DocumentEntry {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut entry = DocumentEntry::new(file_name, path.to_string_lossy());

    if let Ok(relative) = path.strip_prefix(root) {
        let parts: Vec<_> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        entry.file_relative_path = Some(parts.join("/"));
    }
    entry.file_dir = path
        .parent()
        .and_then(|parent| parent.components().last())
        .map(|c| c.as_os_str().to_string_lossy().to_string());
    if path.extension().is_some_and(|ext| ext == "md") {
        entry.file_type = Some("markdown".to_string());
    }
    entry.modified = metadata.modified().ok().map(|time| {
        let time: DateTime<Utc> = time.into();
        time.to_rfc3339_opts(SecondsFormat::Millis, true)
    });
    entry
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

#[async_trait]
impl PersistencePort for FsPersistence {
    async fn list_all(&self) -> PortResult<Vec<DocumentEntry>> {
        let entries = self
            .blocking(|root| {
                let entries = WalkDir::new(&root)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()))
                    .filter_map(Result::ok)
                    .filter_map(|e| {
                        let metadata = e.metadata().ok()?;
                        metadata
                            .is_file()
                            .then(|| entry_for(&root, e.path(), &metadata))
                    })
                    .collect::<Vec<_>>();
                Ok(entries)
            })
            .await?;
        debug!(count = entries.len(), "listed documents directory");
        Ok(entries)
    }

    async fn fetch_one(&self, relative_path: &str) -> PortResult<DocumentEntry> {
        let path = self.resolve(relative_path)?;
        self.blocking(move |root| {
            let metadata = fs::metadata(&path)?;
            if !metadata.is_file() {
                return Err(PortError::rejected(format!(
                    "not a document: {}",
                    path.display()
                )));
            }
            Ok(entry_for(&root, &path, &metadata))
        })
        .await
    }

    async fn read(&self, relative_path: &str) -> PortResult<String> {
        let path = self.resolve(relative_path)?;
        self.blocking(move |_| Ok(fs::read_to_string(path)?)).await
    }

    async fn write(&self, relative_path: &str, content: &str) -> PortResult<()> {
        let path = self.resolve(relative_path)?;
        let content = content.to_string();
        self.blocking(move |_| {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
            Ok(())
        })
        .await?;
        debug!(path = relative_path, "wrote document");
        Ok(())
    }

    async fn remove(&self, relative_path: &str) -> PortResult<()> {
        let path = self.resolve(relative_path)?;
        self.blocking(move |root| {
            fs::remove_file(&path)?;
            if let Some(parent) = path.parent() {
                if parent != root && fs::read_dir(parent)?.next().is_none() {
                    fs::remove_dir(parent)?;
                }
            }
            Ok(())
        })
        .await?;
        debug!(path = relative_path, "removed document");
        Ok(())
    }

    async fn rename(&self, relative_path: &str, new_name: &str) -> PortResult<()> {
        let path = self.resolve(relative_path)?;
        if new_name.is_empty() || new_name.contains(['/', '\\']) || new_name == ".." {
            return Err(PortError::rejected(format!("invalid file name: {new_name}")));
        }
        let new_name = new_name.to_string();
        self.blocking(move |_| {
            let target = path.with_file_name(&new_name);
            if target.exists() {
                return Err(PortError::rejected(format!(
                    "file already exists: {}",
                    target.display()
                )));
            }
            fs::rename(&path, &target)?;
            Ok(())
        })
        .await
    }
}
