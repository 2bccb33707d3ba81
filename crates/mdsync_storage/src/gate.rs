//! Backend activity gate.
//!
//! The file-system backend and the replication adapter share the documents
//! directory. While one of them is working on it, the other answers with a
//! retryable rejection instead of blocking, which is what feeds the retry
//! policy on the caller's side.

use crate::error::{PortError, PortResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Message returned while a replication run holds the gate.
pub const REPLICATION_BUSY: &str = "Sync is already in progress, Please re-try after some time!";

/// Message returned while another file operation holds the gate.
pub const FILE_SYSTEM_BUSY: &str = "FileSystem sync in progress, Please re-try after some time!";

/// Kind of work holding the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    /// A persistence call touching the documents directory.
    FileSystem,
    /// A replication run (configure or sync).
    Replication,
}

#[derive(Debug, Default)]
struct GateState {
    file_system: AtomicBool,
    replication: AtomicBool,
}

impl GateState {
    fn flag(&self, activity: Activity) -> &AtomicBool {
        match activity {
            Activity::FileSystem => &self.file_system,
            Activity::Replication => &self.replication,
        }
    }
}

/// Shared busy flags for the documents directory.
///
/// Cloning the gate shares the same flags.
#[derive(Debug, Clone, Default)]
pub struct ActivityGate {
    state: Arc<GateState>,
}

impl ActivityGate {
    /// Creates an idle gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `activity` currently holds the gate.
    pub fn is_busy(&self, activity: Activity) -> bool {
        self.state.flag(activity).load(Ordering::SeqCst)
    }

    /// Enters the gate for a file operation.
    ///
    /// Fails with a retryable rejection while a replication run or another
    /// file operation is in progress.
    pub fn enter_file_system(&self) -> PortResult<GateGuard> {
        if self.is_busy(Activity::Replication) {
            return Err(PortError::retry(REPLICATION_BUSY));
        }
        self.acquire(Activity::FileSystem, FILE_SYSTEM_BUSY)
    }

    /// Enters the gate for a replication run.
    ///
    /// Fails with a retryable rejection while another replication run or a
    /// file operation is in progress.
    pub fn enter_replication(&self) -> PortResult<GateGuard> {
        if self.is_busy(Activity::FileSystem) {
            return Err(PortError::retry(FILE_SYSTEM_BUSY));
        }
        self.acquire(Activity::Replication, REPLICATION_BUSY)
    }

    fn acquire(&self, activity: Activity, busy_message: &str) -> PortResult<GateGuard> {
        self.state
            .flag(activity)
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| PortError::retry(busy_message))?;
        Ok(GateGuard {
            state: Arc::clone(&self.state),
            activity,
        })
    }
}

/// Holds the gate until dropped.
#[derive(Debug)]
pub struct GateGuard {
    state: Arc<GateState>,
    activity: Activity,
}

impl GateGuard {
    /// Returns the activity holding the gate.
    pub fn activity(&self) -> Activity {
        self.activity
    }
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.state.flag(self.activity).store(false, Ordering::SeqCst);
    }
}
