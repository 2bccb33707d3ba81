//! Replication status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Progress of configure/sync runs.
///
/// `messages` grows during one attempt and is cleared when the next
/// configure or sync attempt starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// A configure or sync attempt is running.
    pub is_syncing: bool,
    /// Completion time of the last successful attempt.
    pub last_sync: Option<DateTime<Utc>>,
    /// Messages of the current attempt, in arrival order.
    pub messages: Vec<String>,
}

impl SyncStatus {
    /// Starts an attempt: clears messages and sets `is_syncing`.
    pub fn begin_attempt(&mut self) {
        self.messages.clear();
        self.is_syncing = true;
    }

    /// Ends an attempt successfully at `at`.
    pub fn succeed(&mut self, at: DateTime<Utc>, message: impl Into<String>) {
        self.is_syncing = false;
        self.last_sync = Some(at);
        self.messages.push(message.into());
    }

    /// Ends an attempt with a failure message.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.is_syncing = false;
        self.messages.push(message.into());
    }

    /// Appends a message.
    pub fn push(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }
}
