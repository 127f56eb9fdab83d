//! Watch event dispatch
//!
//! [`SyncDispatcher`] turns each [`WatchEvent`] into at most one queued
//! remote operation:
//!
//! | event                  | operation                                   |
//! |------------------------|---------------------------------------------|
//! | `Add`                  | upload, unless the path is move-marked      |
//! | `Change`               | upload                                      |
//! | `Unlink` / `UnlinkDir` | delete, only with `remove`, unless marked   |
//! | `Moved` (two of them)  | one move of the paired paths                |
//!
//! Ignored paths never reach the remote store. Every remote failure is
//! logged with the store identity and both paths, then swallowed; the
//! session keeps running.
//!
//! The dispatcher owns the session's [`MoveCorrelator`] and is driven from
//! a single task. Move tasks report back through the channel returned by
//! [`SyncDispatcher::new`]; the owner feeds those messages to
//! [`SyncDispatcher::apply_settled`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::FutureExt;
use sitesync_core::domain::newtypes::{PublishMode, RemotePath};
use sitesync_core::ports::{IIgnoreFilter, IRemoteStore, RemoteError};
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::correlator::{MoveCorrelator, RenameEvent};
use crate::notify_log::{Completion, NotifyLogger};
use crate::path::PathTranslator;
use crate::queue::TaskQueue;
use crate::watcher::WatchEvent;
use crate::SyncError;

/// Per-session dispatch settings
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatcherOptions {
    /// Publish mode for uploads
    pub mode: PublishMode,
    /// Mirror local deletions as remote deletes
    pub remove: bool,
}

/// Why an event produced no remote operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// The path (or its parent) belongs to a move already being mirrored
    InFlightMove,
    /// The ignore predicate matched
    Ignored,
    /// A deletion arrived but `remove` is off
    RemoveDisabled,
}

/// What the dispatcher did with one event
pub enum Dispatch {
    /// A remote operation was queued; the future resolves once it settled
    Submitted(Completion),
    /// The event was dropped
    Suppressed(SuppressReason),
    /// A raw move notification is waiting for its partner
    Buffered,
}

impl std::fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dispatch::Submitted(_) => f.write_str("Submitted"),
            Dispatch::Suppressed(reason) => f.debug_tuple("Suppressed").field(reason).finish(),
            Dispatch::Buffered => f.write_str("Buffered"),
        }
    }
}

impl Dispatch {
    pub fn is_submitted(&self) -> bool {
        matches!(self, Dispatch::Submitted(_))
    }

    /// Waits for the queued operation, if any
    pub async fn settled(self) {
        if let Dispatch::Submitted(done) = self {
            done.await;
        }
    }
}

/// Reported by a move task once its remote call settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveSettled {
    pub old: PathBuf,
    pub new: PathBuf,
}

/// Routes watch events of one session to the remote store
pub struct SyncDispatcher {
    store: Arc<dyn IRemoteStore>,
    queue: TaskQueue,
    translator: PathTranslator,
    ignore: Arc<dyn IIgnoreFilter>,
    options: DispatcherOptions,
    notify: NotifyLogger,
    correlator: MoveCorrelator,
    settled_tx: mpsc::UnboundedSender<MoveSettled>,
}

impl SyncDispatcher {
    /// Creates a dispatcher and the receiver for move settlements
    pub fn new(
        store: Arc<dyn IRemoteStore>,
        queue: TaskQueue,
        translator: PathTranslator,
        ignore: Arc<dyn IIgnoreFilter>,
        options: DispatcherOptions,
        notify: NotifyLogger,
    ) -> (Self, mpsc::UnboundedReceiver<MoveSettled>) {
        let (settled_tx, settled_rx) = mpsc::unbounded_channel();
        let dispatcher = Self {
            store,
            queue,
            translator,
            ignore,
            options,
            notify,
            correlator: MoveCorrelator::new(),
            settled_tx,
        };
        (dispatcher, settled_rx)
    }

    /// Move correlation state, for inspection
    pub fn correlator(&self) -> &MoveCorrelator {
        &self.correlator
    }

    /// Handles one event
    ///
    /// # Errors
    /// [`SyncError::OutsideRoot`] if the event's path is not under the
    /// watched root. Remote failures are never returned; they are logged
    /// by the queued task.
    pub fn dispatch(&mut self, event: WatchEvent) -> Result<Dispatch, SyncError> {
        let action = event.action();
        match event {
            WatchEvent::Add(path) => {
                if self.correlator.is_suppressed(&path) {
                    return Ok(self.suppress(&path, action, SuppressReason::InFlightMove));
                }
                if self.ignore.is_ignored(&path) {
                    return Ok(self.suppress(&path, action, SuppressReason::Ignored));
                }
                self.submit_upload(action, path)
            }

            WatchEvent::Change(path) => {
                if self.ignore.is_ignored(&path) {
                    return Ok(self.suppress(&path, action, SuppressReason::Ignored));
                }
                self.submit_upload(action, path)
            }

            WatchEvent::Unlink(path) | WatchEvent::UnlinkDir(path) => {
                self.handle_unlink(action, path)
            }

            WatchEvent::Moved(path) => match self.correlator.observe_moved(&path) {
                Some(rename) => self.handle_rename(rename),
                None => Ok(Dispatch::Buffered),
            },
        }
    }

    /// Writes the last notify log batch and waits for it
    pub async fn close(self) {
        self.notify.close().await;
    }

    /// Releases move marks once a move task has settled
    pub fn apply_settled(&mut self, settled: MoveSettled) {
        self.correlator.settle(&settled.old, &settled.new);
    }

    fn suppress(&self, path: &Path, action: &str, reason: SuppressReason) -> Dispatch {
        debug!(path = %path.display(), action, reason = ?reason, "Suppressed event");
        Dispatch::Suppressed(reason)
    }

    fn handle_unlink(&mut self, action: &'static str, path: PathBuf) -> Result<Dispatch, SyncError> {
        if !self.options.remove {
            return Ok(self.suppress(&path, action, SuppressReason::RemoveDisabled));
        }
        if self.correlator.is_suppressed(&path) {
            return Ok(self.suppress(&path, action, SuppressReason::InFlightMove));
        }
        if self.ignore.is_ignored(&path) {
            return Ok(self.suppress(&path, action, SuppressReason::Ignored));
        }

        let remote = self.translator.translate(&path)?;
        let store = Arc::clone(&self.store);
        let local = path.clone();
        let handle = self.queue.add(async move {
            if let Err(err) = store.delete(&remote).await {
                log_failure(store.identity(), &remote, &local, &err, "Delete failed");
            }
        });

        Ok(self.submitted(action, &path, handle.map(|_| ()).boxed().shared()))
    }

    fn submit_upload(&mut self, action: &'static str, path: PathBuf) -> Result<Dispatch, SyncError> {
        let remote = self.translator.translate(&path)?;
        let store = Arc::clone(&self.store);
        let mode = self.options.mode;
        let local = path.clone();

        let handle = self.queue.add(async move {
            upload_with_retry(store.as_ref(), &local, &remote, mode).await;
        });

        Ok(self.submitted(action, &path, handle.map(|_| ()).boxed().shared()))
    }

    fn handle_rename(&mut self, rename: RenameEvent) -> Result<Dispatch, SyncError> {
        let RenameEvent { old, new } = rename;
        if self.ignore.is_ignored(&old) {
            return Ok(self.suppress(&old, "rename", SuppressReason::Ignored));
        }

        let from = self.translator.translate(&old)?;
        let to = self.translator.translate(&new)?;
        let store = Arc::clone(&self.store);
        let settled_tx = self.settled_tx.clone();
        let settled = MoveSettled {
            old: old.clone(),
            new: new.clone(),
        };

        debug!(old = %old.display(), new = %new.display(), "Queueing move");
        let handle = self.queue.add(async move {
            if let Err(err) = store.move_item(&from, &to).await {
                error!(
                    identity = %store.identity(),
                    remote = %from,
                    to = %to,
                    path = %settled.old.display(),
                    kind = err.kind(),
                    error = %err,
                    "Move failed"
                );
            }
            // The session may already be gone
            let _ = settled_tx.send(settled);
        });

        let label = PathBuf::from(format!("{} -> {}", old.display(), new.display()));
        Ok(self.submitted("rename", &label, handle.map(|_| ()).boxed().shared()))
    }

    fn submitted(&self, action: &str, path: &Path, done: Completion) -> Dispatch {
        self.notify.trigger(action, path, done.clone());
        Dispatch::Submitted(done)
    }
}

/// Uploads once, retrying a single time on a retryable error
async fn upload_with_retry(
    store: &dyn IRemoteStore,
    local: &Path,
    remote: &RemotePath,
    mode: PublishMode,
) {
    let err = match store.upload(local, remote, mode).await {
        Ok(()) => return,
        Err(err) => err,
    };

    if err.is_fatal() {
        log_failure(store.identity(), remote, local, &err, "Upload failed");
        return;
    }

    debug!(
        remote = %remote,
        path = %local.display(),
        error = %err,
        "Upload failed, retrying once"
    );
    if let Err(err) = store.upload(local, remote, mode).await {
        log_failure(store.identity(), remote, local, &err, "Upload failed after retry");
    }
}

fn log_failure(identity: &str, remote: &RemotePath, local: &Path, err: &RemoteError, message: &str) {
    error!(
        identity = %identity,
        remote = %remote,
        path = %local.display(),
        kind = err.kind(),
        error = %err,
        "{}",
        message
    );
}
