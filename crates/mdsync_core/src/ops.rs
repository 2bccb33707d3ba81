//! Per-operation busy flags and last errors.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Kinds of operations tracked for the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationKind {
    /// Bulk listing.
    ListAll,
    /// Single metadata refresh.
    FetchOne,
    /// Load content and select.
    Open,
    /// Format, check, and write the editor buffer.
    Save,
    /// Create an empty document.
    Add,
    /// Remove a document.
    Delete,
    /// Rename a document.
    Rename,
    /// Set up replication.
    Configure,
    /// Run a replication sync.
    Sync,
}

impl OperationKind {
    /// Every kind, in declaration order.
    pub const ALL: [OperationKind; 9] = [
        OperationKind::ListAll,
        OperationKind::FetchOne,
        OperationKind::Open,
        OperationKind::Save,
        OperationKind::Add,
        OperationKind::Delete,
        OperationKind::Rename,
        OperationKind::Configure,
        OperationKind::Sync,
    ];

    /// Short lowercase name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::ListAll => "list_all",
            OperationKind::FetchOne => "fetch_one",
            OperationKind::Open => "open",
            OperationKind::Save => "save",
            OperationKind::Add => "add",
            OperationKind::Delete => "delete",
            OperationKind::Rename => "rename",
            OperationKind::Configure => "configure",
            OperationKind::Sync => "sync",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default, Clone)]
struct KindState {
    in_flight: usize,
    last_error: Option<String>,
}

/// Busy state and last error of one operation kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationSnapshot {
    /// Operation kind.
    pub kind: OperationKind,
    /// At least one dispatch is pending.
    pub busy: bool,
    /// Message of the most recent rejection, cleared when a dispatch starts.
    pub last_error: Option<String>,
}

/// Busy and error tracking for every operation kind.
///
/// Busy is an in-flight counter, so overlapping dispatches of one kind keep
/// the flag set until the last one settles. Cloning shares the state.
#[derive(Debug, Clone, Default)]
pub struct OperationStates {
    inner: Arc<Mutex<HashMap<OperationKind, KindState>>>,
}

impl OperationStates {
    /// Creates idle state for every kind.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a dispatch of `kind` as started.
    ///
    /// Clears the kind's last error. The flag is released when the returned
    /// guard drops.
    pub fn begin(&self, kind: OperationKind) -> BusyGuard {
        {
            let mut states = self.inner.lock();
            let state = states.entry(kind).or_default();
            state.in_flight += 1;
            state.last_error = None;
        }
        BusyGuard {
            states: self.clone(),
            kind,
        }
    }

    /// Returns true while a dispatch of `kind` is pending.
    pub fn is_busy(&self, kind: OperationKind) -> bool {
        self.inner
            .lock()
            .get(&kind)
            .is_some_and(|s| s.in_flight > 0)
    }

    /// Returns the last error recorded for `kind`.
    pub fn last_error(&self, kind: OperationKind) -> Option<String> {
        self.inner.lock().get(&kind).and_then(|s| s.last_error.clone())
    }

    /// Returns the state of `kind`.
    pub fn snapshot(&self, kind: OperationKind) -> OperationSnapshot {
        let states = self.inner.lock();
        let state = states.get(&kind).cloned().unwrap_or_default();
        OperationSnapshot {
            kind,
            busy: state.in_flight > 0,
            last_error: state.last_error,
        }
    }

    /// Returns the state of every kind.
    pub fn snapshots(&self) -> Vec<OperationSnapshot> {
        OperationKind::ALL
            .iter()
            .map(|kind| self.snapshot(*kind))
            .collect()
    }

    fn record_error(&self, kind: OperationKind, message: String) {
        self.inner.lock().entry(kind).or_default().last_error = Some(message);
    }

    fn finish(&self, kind: OperationKind) {
        if let Some(state) = self.inner.lock().get_mut(&kind) {
            state.in_flight = state.in_flight.saturating_sub(1);
        }
    }
}

/// Keeps an operation kind busy until dropped.
#[derive(Debug)]
#[must_use = "the operation is marked idle as soon as the guard drops"]
pub struct BusyGuard {
    states: OperationStates,
    kind: OperationKind,
}

impl BusyGuard {
    /// Returns the guarded kind.
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Records a rejection for this kind.
    pub fn fail(&self, message: impl Into<String>) {
        self.states.record_error(self.kind, message.into());
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.states.finish(self.kind);
    }
}
