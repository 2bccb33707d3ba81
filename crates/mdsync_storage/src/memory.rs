//! In-memory persistence backend for testing.

use crate::error::{PortError, PortResult};
use crate::port::{DocumentEntry, PersistencePort};
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;

/// Identifies a persistence call, for fault injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortOp {
    /// `list_all`
    ListAll,
    /// `fetch_one`
    FetchOne,
    /// `read`
    Read,
    /// `write`
    Write,
    /// `remove`
    Remove,
    /// `rename`
    Rename,
}

#[derive(Debug, Clone)]
struct StoredDocument {
    content: String,
    modified: DateTime<Utc>,
}

/// Pauses one call until released.
///
/// Returned by [`InMemoryPersistence::hold`]. Clones share the same pair of
/// signals, so a test keeps one clone and the held call waits on another.
#[derive(Debug, Clone, Default)]
pub struct Hold {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl Hold {
    /// Creates an unreleased hold.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals entry, then waits for [`release`](Self::release).
    pub async fn pause(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }

    /// Waits until the held call has been entered.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Lets the held call proceed.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// An in-memory document backend.
///
/// Documents live in a map keyed by relative path; absolute paths are
/// formed by joining the configured root. Modification times come from a
/// logical clock that advances one second per write, so listings are
/// deterministic.
///
/// Scripted failures ([`fail_next`](Self::fail_next)) and pauses
/// ([`hold`](Self::hold)) make the backend suitable for exercising retry,
/// conflict, and busy-state behaviour.
///
/// # Example
///
/// ```rust
/// use mdsync_storage::{InMemoryPersistence, PersistencePort};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let backend = InMemoryPersistence::new("/home/.mediocre");
/// backend.write("notes.md", "# Notes").await.unwrap();
/// assert_eq!(backend.read("notes.md").await.unwrap(), "# Notes");
/// # });
/// ```
#[derive(Debug)]
pub struct InMemoryPersistence {
    root: String,
    documents: RwLock<BTreeMap<String, StoredDocument>>,
    clock: Mutex<DateTime<Utc>>,
    faults: Mutex<HashMap<PortOp, VecDeque<PortError>>>,
    holds: Mutex<HashMap<PortOp, Hold>>,
    calls: Mutex<HashMap<PortOp, usize>>,
}

impl InMemoryPersistence {
    /// Creates an empty backend rooted at `root`.
    pub fn new(root: impl Into<String>) -> Self {
        let root = root.into().trim_end_matches('/').to_string();
        let epoch = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_default();
        Self {
            root,
            documents: RwLock::new(BTreeMap::new()),
            clock: Mutex::new(epoch),
            faults: Mutex::new(HashMap::new()),
            holds: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the root prefix used for absolute paths.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Stores a document directly, bypassing call counting and faults.
    ///
    /// Used to seed the backend or to simulate an external edit.
    pub fn insert(&self, relative_path: &str, content: &str) {
        let modified = self.tick();
        self.documents.write().insert(
            relative_path.to_string(),
            StoredDocument {
                content: content.to_string(),
                modified,
            },
        );
    }

    /// Overrides a document's modification time.
    pub fn set_modified(&self, relative_path: &str, modified: DateTime<Utc>) {
        if let Some(doc) = self.documents.write().get_mut(relative_path) {
            doc.modified = modified;
        }
    }

    /// Returns the stored content without going through the port.
    pub fn content(&self, relative_path: &str) -> Option<String> {
        self.documents
            .read()
            .get(relative_path)
            .map(|doc| doc.content.clone())
    }

    /// Returns the number of stored documents.
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// Returns true if no documents are stored.
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    /// Queues a failure for the next call of `op`.
    pub fn fail_next(&self, op: PortOp, error: PortError) {
        self.fail_times(op, error, 1);
    }

    /// Queues the same failure for the next `times` calls of `op`.
    pub fn fail_times(&self, op: PortOp, error: PortError, times: usize) {
        let mut faults = self.faults.lock();
        let queue = faults.entry(op).or_default();
        for _ in 0..times {
            queue.push_back(error.clone());
        }
    }

    /// Pauses the next call of `op` until the returned hold is released.
    pub fn hold(&self, op: PortOp) -> Hold {
        let hold = Hold::new();
        self.holds.lock().insert(op, hold.clone());
        hold
    }

    /// Returns how many times `op` has been called.
    pub fn calls(&self, op: PortOp) -> usize {
        self.calls.lock().get(&op).copied().unwrap_or(0)
    }

    async fn begin(&self, op: PortOp) -> PortResult<()> {
        *self.calls.lock().entry(op).or_insert(0) += 1;

        let hold = self.holds.lock().remove(&op);
        if let Some(hold) = hold {
            hold.pause().await;
        }

        let fault = self
            .faults
            .lock()
            .get_mut(&op)
            .and_then(|queue| queue.pop_front());
        match fault {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn tick(&self) -> DateTime<Utc> {
        let mut clock = self.clock.lock();
        *clock += Duration::seconds(1);
        *clock
    }

    fn entry(&self, relative_path: &str, doc: &StoredDocument) -> DocumentEntry {
        let file_path = format!("{}/{}", self.root, relative_path);
        let file_name = relative_path
            .rsplit('/')
            .next()
            .unwrap_or(relative_path)
            .to_string();
        let file_dir = file_path
            .rsplit('/')
            .nth(1)
            .filter(|dir| !dir.is_empty())
            .map(str::to_string);

        let mut entry = DocumentEntry::new(file_name, file_path)
            .with_relative_path(relative_path)
            .with_modified(doc.modified.to_rfc3339_opts(SecondsFormat::Millis, true));
        entry.file_dir = file_dir;
        if relative_path.ends_with(".md") {
            entry.file_type = Some("markdown".to_string());
        }
        entry
    }

    fn not_found(relative_path: &str) -> PortError {
        PortError::rejected(format!("No such file or directory: {relative_path}"))
    }
}

#[async_trait]
impl PersistencePort for InMemoryPersistence {
    async fn list_all(&self) -> PortResult<Vec<DocumentEntry>> {
        self.begin(PortOp::ListAll).await?;
        let documents = self.documents.read();
        Ok(documents
            .iter()
            .map(|(path, doc)| self.entry(path, doc))
            .collect())
    }

    async fn fetch_one(&self, relative_path: &str) -> PortResult<DocumentEntry> {
        self.begin(PortOp::FetchOne).await?;
        let documents = self.documents.read();
        documents
            .get(relative_path)
            .map(|doc| self.entry(relative_path, doc))
            .ok_or_else(|| Self::not_found(relative_path))
    }

    async fn read(&self, relative_path: &str) -> PortResult<String> {
        self.begin(PortOp::Read).await?;
        self.content(relative_path)
            .ok_or_else(|| Self::not_found(relative_path))
    }

    async fn write(&self, relative_path: &str, content: &str) -> PortResult<()> {
        self.begin(PortOp::Write).await?;
        self.insert(relative_path, content);
        Ok(())
    }

    async fn remove(&self, relative_path: &str) -> PortResult<()> {
        self.begin(PortOp::Remove).await?;
        self.documents
            .write()
            .remove(relative_path)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(relative_path))
    }

    async fn rename(&self, relative_path: &str, new_name: &str) -> PortResult<()> {
        self.begin(PortOp::Rename).await?;
        let target = match relative_path.rsplit_once('/') {
            Some((dir, _)) => format!("{dir}/{new_name}"),
            None => new_name.to_string(),
        };

        let mut documents = self.documents.write();
        if documents.contains_key(&target) {
            return Err(PortError::rejected(format!("File already exists: {target}")));
        }
        let doc = documents
            .remove(relative_path)
            .ok_or_else(|| Self::not_found(relative_path))?;
        documents.insert(target, doc);
        Ok(())
    }
}
