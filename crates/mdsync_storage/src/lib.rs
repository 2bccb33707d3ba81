//! # mdsync Storage
//!
//! Persistence port and document backends for mdsync.
//!
//! This crate is the lowest layer of mdsync. A backend stores markdown
//! documents addressed by a path relative to the documents root and reports
//! metadata for them. Backends know nothing about caching, selection, or
//! conflicts; those belong to `mdsync_core` and `mdsync_engine`.
//!
//! ## Response convention
//!
//! Every call returns [`PortResult`]. A backend that wants the caller to try
//! again answers [`PortError::Rejected`] with `retryable` set; the JSON form
//! of that convention (`{status, retry, message, ...}`) lives in [`wire`].
//!
//! ## Available Backends
//!
//! - [`InMemoryPersistence`] - For testing, with scripted faults and pauses
//! - [`FsPersistence`] - Documents directory on the local file system
//!
//! ## Example
//!
//! ```rust
//! use mdsync_storage::{InMemoryPersistence, PersistencePort};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let backend = InMemoryPersistence::new("/home/.mediocre");
//! backend.write("notes.md", "").await.unwrap();
//! let entry = backend.fetch_one("notes.md").await.unwrap();
//! assert_eq!(entry.file_path, "/home/.mediocre/notes.md");
//! # });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod gate;
mod memory;
mod port;
pub mod wire;

pub use error::{PortError, PortResult};
pub use file::{FsPersistence, FsPersistenceConfig};
pub use gate::{Activity, ActivityGate, GateGuard, FILE_SYSTEM_BUSY, REPLICATION_BUSY};
pub use memory::{Hold, InMemoryPersistence, PortOp};
pub use port::{DocumentEntry, PersistencePort};
