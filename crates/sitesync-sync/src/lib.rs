//! sitesync Sync - local directory → remote store mirroring engine
//!
//! Provides:
//! - One-shot folder upload with a single retry pass
//! - A live watch session mirroring creates, edits, deletes and renames
//! - Correlation of raw "moved" notifications into a single remote move
//! - A bounded FIFO queue shared by both paths
//!
//! ## Modules
//!
//! - [`path`] - Local → remote path translation
//! - [`queue`] - Bounded-concurrency FIFO task queue
//! - [`initial`] - One-shot folder upload (`upload_folder`)
//! - [`correlator`] - Raw "moved" notification pairing and in-flight marks
//! - [`dispatcher`] - Turns watcher events into queued remote operations
//! - [`notify_log`] - Debounced, append-only action log
//! - [`watcher`] - `notify`-backed file watcher and per-path debounce queue
//! - [`session`] - Watch session lifecycle (`watch`)
//! - [`filter`] - Gitignore-style ignore filter

pub mod correlator;
pub mod dispatcher;
pub mod filter;
pub mod initial;
pub mod notify_log;
pub mod path;
pub mod queue;
pub mod session;
pub mod watcher;

use std::path::PathBuf;

use sitesync_core::domain::{errors::DomainError, newtypes::RemotePath};
use sitesync_core::ports::RemoteError;
use thiserror::Error;

pub use dispatcher::{Dispatch, SuppressReason, SyncDispatcher};
pub use filter::GitignoreFilter;
pub use initial::{upload_folder, UploadFailure, UploadOptions, UploadReport};
pub use queue::{TaskHandle, TaskQueue};
pub use session::{watch, SessionState, WatchHandle, WatchOptions};

/// Errors that can occur during synchronization operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error occurred while reading the local tree
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// A path was handed to the engine that is not under the watched root
    #[error("Path {path} is not inside root {root}")]
    OutsideRoot {
        /// The offending local path
        path: PathBuf,
        /// The watched root
        root: PathBuf,
    },

    /// The local root is missing or not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// A fatal remote error aborted the batch
    #[error("Fatal remote error for {path} → {remote}: {source}")]
    Fatal {
        /// Local payload path
        path: PathBuf,
        /// Remote request path
        remote: RemotePath,
        /// The classified remote error
        #[source]
        source: RemoteError,
    },

    /// The OS-level file watcher could not be set up
    #[error("Watcher error: {0}")]
    Watcher(#[from] notify::Error),

    /// Ignore rules could not be compiled
    #[error("Invalid ignore rules: {0}")]
    IgnoreRules(#[from] ::ignore::Error),

    /// A queued task was dropped before it completed
    #[error("Task queue closed before the task completed")]
    QueueClosed,

    /// A domain-level error propagated from sitesync-core
    #[error("Domain error: {0}")]
    DomainError(#[from] DomainError),
}
