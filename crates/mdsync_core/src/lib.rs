//! # mdsync Core
//!
//! Document model and shared state for mdsync.
//!
//! This crate provides:
//! - [`Document`] and the [`DocumentCache`] that owns every cached document
//! - [`ConflictDetector`] for the pre-write check on save
//! - The [`Formatter`] boundary applied to the editor buffer
//! - Per-operation busy flags and last errors ([`OperationStates`])
//! - Replication status and durable replication settings
//! - [`AppContext`], the state shared by the engine and the UI
//!
//! Nothing here performs backend I/O; `mdsync_engine` drives the backends
//! and mutates this state.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod conflict;
mod context;
mod document;
mod error;
mod format;
mod ops;
mod settings;
mod status;

pub use cache::DocumentCache;
pub use conflict::{digest, Conflict, ConflictDetector, CONFLICT_MESSAGE};
pub use context::{AppContext, Workspace};
pub use document::{Document, DocumentKind, DocumentPatch};
pub use error::{CoreError, CoreResult};
pub use format::{Formatter, Identity, MarkdownTidy};
pub use ops::{BusyGuard, OperationKind, OperationSnapshot, OperationStates};
pub use settings::{ReplicationConfig, ReplicationProvider, SettingsStore};
pub use status::SyncStatus;
