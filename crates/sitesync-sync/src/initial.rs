//! One-shot folder upload
//!
//! [`InitialSyncRunner`] walks the source tree once, filters it through the
//! extension allow-list and the ignore predicate, and uploads every
//! surviving file through the shared [`TaskQueue`].
//!
//! ## Retry Logic
//!
//! Each file gets at most two attempts:
//!
//! 1. **First pass**: every candidate is submitted. Retryable failures are
//!    recorded and the pass continues.
//! 2. **Retry pass**: only the recorded failures are submitted again.
//!    Whatever fails here is logged and reported, never retried again.
//!
//! A fatal error in either pass abandons the whole run: the error is
//! returned and every task of the run that has not started yet skips its
//! remote call.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use sitesync_core::config::{extension_allowed, Config};
use sitesync_core::domain::newtypes::{PublishMode, RemotePath};
use sitesync_core::ports::{IIgnoreFilter, IRemoteStore, RemoteError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::path::PathTranslator;
use crate::queue::TaskQueue;
use crate::SyncError;

// ============================================================================
// Options and results
// ============================================================================

/// Settings for a folder upload
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Publish mode passed to every upload
    pub mode: PublishMode,
    /// Extension allow-list; empty allows every file
    pub allowed_extensions: Vec<String>,
}

impl UploadOptions {
    /// Takes mode and allow-list from the `sync` section
    pub fn from_config(config: &Config) -> Self {
        Self {
            mode: config.sync.mode,
            allowed_extensions: config.sync.allowed_extensions.clone(),
        }
    }
}

/// A file that could not be uploaded, even after its retry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadFailure {
    /// Local file
    pub file: PathBuf,
    /// Remote destination it was uploaded to
    pub remote: RemotePath,
    /// Last error message
    pub error: String,
}

/// Summary of a completed folder upload
#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadReport {
    /// Files uploaded successfully (first pass or retry)
    pub uploaded: usize,
    /// Candidates dropped by the allow-list or the ignore predicate
    pub skipped: usize,
    /// Files that failed both attempts
    pub failures: Vec<UploadFailure>,
}

impl UploadReport {
    /// Returns true if every candidate made it to the remote store
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A queued attempt together with the file and remote path it was for
type PassOutcome =
    Pin<Box<dyn Future<Output = (PathBuf, RemotePath, Result<Attempt, SyncError>)> + Send>>;

/// Outcome of one queued upload attempt
enum Attempt {
    Uploaded,
    Failed(RemoteError),
    /// The run was abandoned before this task started
    Aborted,
}

// ============================================================================
// InitialSyncRunner
// ============================================================================

/// Uploads a whole local tree to the remote store
pub struct InitialSyncRunner {
    store: Arc<dyn IRemoteStore>,
    queue: TaskQueue,
    translator: PathTranslator,
    ignore: Arc<dyn IIgnoreFilter>,
    options: UploadOptions,
}

impl InitialSyncRunner {
    pub fn new(
        store: Arc<dyn IRemoteStore>,
        queue: TaskQueue,
        translator: PathTranslator,
        ignore: Arc<dyn IIgnoreFilter>,
        options: UploadOptions,
    ) -> Self {
        Self {
            store,
            queue,
            translator,
            ignore,
            options,
        }
    }

    /// Walks the source root and uploads every candidate file
    pub async fn run(&self) -> Result<UploadReport, SyncError> {
        let files = collect_files(self.translator.src_root()).await?;
        self.run_with(files).await
    }

    /// Uploads an already-computed candidate list
    #[tracing::instrument(skip_all, fields(root = %self.translator.src_root().display(), dest = %self.translator.dest_root()))]
    pub async fn run_with(&self, candidates: Vec<PathBuf>) -> Result<UploadReport, SyncError> {
        let total = candidates.len();
        let mut report = UploadReport::default();

        let mut targets = Vec::with_capacity(total);
        for file in candidates {
            if !extension_allowed(&self.options.allowed_extensions, &file) {
                debug!(path = %file.display(), "Skipping file outside extension allow-list");
                report.skipped += 1;
                continue;
            }
            if self.ignore.is_ignored(&file) {
                debug!(path = %file.display(), "Skipping ignored file");
                report.skipped += 1;
                continue;
            }
            let remote = self.translator.translate(&file)?;
            targets.push((file, remote));
        }

        info!(
            candidates = total,
            uploading = targets.len(),
            skipped = report.skipped,
            "Starting folder upload"
        );

        let abort = CancellationToken::new();

        // First pass
        let failed = self.run_pass(targets, &abort, &mut report).await?;
        if failed.is_empty() {
            info!(uploaded = report.uploaded, "Folder upload complete");
            return Ok(report);
        }

        // Retry pass, exactly once per failed file
        info!(count = failed.len(), "Retrying failed uploads");
        let retry_targets = failed.into_iter().map(|(file, remote, _)| (file, remote)).collect();
        let still_failed = self.run_pass(retry_targets, &abort, &mut report).await?;

        for (file, remote, err) in still_failed {
            error!(
                identity = %self.store.identity(),
                remote = %remote,
                path = %file.display(),
                kind = err.kind(),
                error = %err,
                "Upload failed after retry"
            );
            report.failures.push(UploadFailure {
                file,
                remote,
                error: err.to_string(),
            });
        }

        info!(
            uploaded = report.uploaded,
            failed = report.failures.len(),
            "Folder upload finished"
        );
        Ok(report)
    }

    /// Submits one pass and collects the retryable failures
    ///
    /// Returns early with [`SyncError::Fatal`] on the first fatal error,
    /// cancelling `abort` so queued tasks of this run skip their call.
    async fn run_pass(
        &self,
        targets: Vec<(PathBuf, RemotePath)>,
        abort: &CancellationToken,
        report: &mut UploadReport,
    ) -> Result<Vec<(PathBuf, RemotePath, RemoteError)>, SyncError> {
        let mut pending: FuturesUnordered<PassOutcome> = FuturesUnordered::new();

        for (file, remote) in targets {
            let handle = self.queue.add(upload_attempt(
                Arc::clone(&self.store),
                file.clone(),
                remote.clone(),
                self.options.mode,
                abort.clone(),
            ));
            pending.push(Box::pin(async move { (file, remote, handle.await) }));
        }

        let mut failed = Vec::new();
        while let Some((file, remote, outcome)) = pending.next().await {
            match outcome {
                Ok(Attempt::Uploaded) => report.uploaded += 1,
                Ok(Attempt::Aborted) => {}
                Ok(Attempt::Failed(err)) if err.is_fatal() => {
                    abort.cancel();
                    error!(
                        identity = %self.store.identity(),
                        remote = %remote,
                        path = %file.display(),
                        kind = err.kind(),
                        error = %err,
                        "Fatal upload error, abandoning folder upload"
                    );
                    return Err(SyncError::Fatal {
                        path: file,
                        remote,
                        source: err,
                    });
                }
                Ok(Attempt::Failed(err)) => {
                    debug!(
                        remote = %remote,
                        path = %file.display(),
                        error = %err,
                        "Upload failed, will retry"
                    );
                    failed.push((file, remote, err));
                }
                Err(err) => {
                    warn!(path = %file.display(), error = %err, "Upload task was dropped");
                    failed.push((
                        file,
                        remote,
                        RemoteError::Network("upload task dropped before completion".into()),
                    ));
                }
            }
        }

        Ok(failed)
    }
}

async fn upload_attempt(
    store: Arc<dyn IRemoteStore>,
    file: PathBuf,
    remote: RemotePath,
    mode: PublishMode,
    abort: CancellationToken,
) -> Attempt {
    if abort.is_cancelled() {
        return Attempt::Aborted;
    }
    match store.upload(&file, &remote, mode).await {
        Ok(()) => {
            debug!(path = %file.display(), remote = %remote, "Uploaded");
            Attempt::Uploaded
        }
        Err(err) => Attempt::Failed(err),
    }
}

/// Uploads every file under `src_root` to `dest_root`
///
/// Convenience wrapper around [`InitialSyncRunner::run`].
pub async fn upload_folder(
    store: Arc<dyn IRemoteStore>,
    queue: TaskQueue,
    src_root: &Path,
    dest_root: RemotePath,
    options: UploadOptions,
    ignore: Arc<dyn IIgnoreFilter>,
) -> Result<UploadReport, SyncError> {
    let translator = PathTranslator::new(src_root, dest_root);
    InitialSyncRunner::new(store, queue, translator, ignore, options)
        .run()
        .await
}

// ============================================================================
// Tree walk
// ============================================================================

/// Recursively lists regular files under `root`, sorted
///
/// Symlinks are not followed.
pub async fn collect_files(root: &Path) -> Result<Vec<PathBuf>, SyncError> {
    let metadata = tokio::fs::metadata(root).await?;
    if !metadata.is_dir() {
        return Err(SyncError::NotADirectory(root.to_path_buf()));
    }

    let mut files = Vec::new();
    walk_directory(root, &mut files).await?;
    files.sort();
    Ok(files)
}

fn walk_directory<'a>(
    dir: &'a Path,
    files: &'a mut Vec<PathBuf>,
) -> Pin<Box<dyn Future<Output = Result<(), SyncError>> + Send + 'a>> {
    Box::pin(async move {
        let mut entries = tokio::fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            let path = entry.path();

            if file_type.is_dir() {
                walk_directory(&path, files).await?;
            } else if file_type.is_file() {
                files.push(path);
            }
        }

        Ok(())
    })
}
