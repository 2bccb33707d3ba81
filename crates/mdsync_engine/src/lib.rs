//! # mdsync Engine
//!
//! Document synchronization and replication engine for mdsync.
//!
//! This crate provides:
//! - [`SyncCoordinator`]: list/open/save/add/delete/rename with busy tracking
//! - [`RetryPolicy`] for backend calls that answer "retry me"
//! - [`CloudSyncEngine`]: replication setup, sync, and status messages
//! - The [`ReplicationPort`] trait with a scripted [`MockReplication`] and a
//!   `git` command-line adapter ([`GitReplication`])
//! - Debounced sync after save ([`AutoSync`])
//!
//! ## Architecture
//!
//! The UI calls the coordinator, which calls the persistence port through
//! the retry policy. On save the conflict check gates the write. The
//! coordinator is the only writer of the document cache; the UI reads the
//! cache, the busy flags, and the replication status from the shared
//! [`mdsync_core::AppContext`].
//!
//! ## Key Invariants
//!
//! - A busy flag is set for exactly the lifetime of its operation
//! - A save never writes over content changed outside the cache
//! - Retries happen only when the backend asks for them
//! - Locks on shared state are never held across an `.await`

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod autosync;
mod cancel;
mod cloud;
mod config;
mod coordinator;
mod error;
mod git;
mod replication;
mod retry;

pub use autosync::{AutoSync, AutoSyncTrigger};
pub use cancel::CancelToken;
pub use cloud::{
    CloudSyncEngine, Subscription, NOT_ENABLED_MESSAGE, SETUP_FAILED_MESSAGE, SUCCESS_MESSAGE,
    SYNC_FAILED_MESSAGE,
};
pub use config::{AutoSyncConfig, EngineConfig, RetryConfig};
pub use coordinator::SyncCoordinator;
pub use error::{ErrorKind, SyncError, SyncResult};
pub use git::GitReplication;
pub use replication::{
    EventData, EventFeed, EventLevel, MockReplication, ReplicationEvent, ReplicationPort,
};
pub use retry::RetryPolicy;
