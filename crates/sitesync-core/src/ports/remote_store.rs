//! Remote store port (driven/secondary port)
//!
//! This module defines the interface the sync engine uses to mirror local
//! changes onto the remote content store. The engine only needs three
//! operations (upload, delete, move); transport, authentication and
//! per-request timeouts belong to the adapter.
//!
//! ## Design Notes
//!
//! - Errors are a typed [`RemoteError`] rather than `anyhow::Error` because
//!   the engine branches on [`RemoteError::is_fatal`]: fatal errors abort a
//!   batch, retryable ones earn exactly one more attempt.
//! - Uses `#[async_trait]` for async trait methods, so the store can be
//!   shared as `Arc<dyn IRemoteStore>`.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::newtypes::{PublishMode, RemotePath};

// ============================================================================
// RemoteError
// ============================================================================

/// A failed remote operation
///
/// Every variant is classified as either fatal (permission and validation
/// failures, which will fail again no matter how often they are retried)
/// or retryable (transient transport or server conditions).
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Credentials were rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Credentials are valid but lack permission for the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The store rejected the request payload (bad path, unsupported file, too large)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The remote path does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The remote path is being modified concurrently
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The store asked us to slow down
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// A server-side error occurred (5xx)
    #[error("Server error ({status}): {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// Connection, DNS, TLS or timeout failure
    #[error("Network error: {0}")]
    Network(String),

    /// The local payload could not be read
    #[error("Failed to read {path}: {source}")]
    LocalRead {
        /// The local file being uploaded
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl RemoteError {
    /// Returns true if retrying the same request cannot succeed
    ///
    /// Fatal errors abort the current batch; everything else is eligible
    /// for exactly one additional attempt.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RemoteError::Unauthorized(_) | RemoteError::Forbidden(_) | RemoteError::Validation(_)
        )
    }

    /// Short machine-friendly label used in logs and JSON output
    pub fn kind(&self) -> &'static str {
        match self {
            RemoteError::Unauthorized(_) => "unauthorized",
            RemoteError::Forbidden(_) => "forbidden",
            RemoteError::Validation(_) => "validation",
            RemoteError::NotFound(_) => "not_found",
            RemoteError::Conflict(_) => "conflict",
            RemoteError::RateLimited(_) => "rate_limited",
            RemoteError::Server { .. } => "server",
            RemoteError::Network(_) => "network",
            RemoteError::LocalRead { .. } => "local_read",
        }
    }
}

// ============================================================================
// IRemoteStore trait
// ============================================================================

/// Port trait for the remote content store
///
/// ## Implementation Notes
///
/// - Implementations must not retry internally on their own schedule in a
///   way that changes the engine's "at most two attempts" guarantee;
///   transport-level timeouts are fine.
/// - `identity()` names the remote account/site and is only used for
///   structured error context.
#[async_trait::async_trait]
pub trait IRemoteStore: Send + Sync {
    /// Remote identity (site or account name) used in log context
    fn identity(&self) -> &str;

    /// Uploads the file at `local` to `remote`, creating or replacing it
    async fn upload(
        &self,
        local: &Path,
        remote: &RemotePath,
        mode: PublishMode,
    ) -> Result<(), RemoteError>;

    /// Deletes the file or folder at `remote`
    async fn delete(&self, remote: &RemotePath) -> Result<(), RemoteError>;

    /// Moves (renames) `from` to `to`; folders move with their contents
    async fn move_item(&self, from: &RemotePath, to: &RemotePath) -> Result<(), RemoteError>;
}
