//! Watch session lifecycle
//!
//! [`watch`] starts the OS watcher, spawns the session task and returns a
//! [`WatchHandle`]. The session moves through
//! `Initializing → Ready → Running → Stopped`:
//!
//! - **Initializing**: the optional one-shot upload of the whole tree.
//!   Events arriving meanwhile are buffered, not lost.
//! - **Ready**: the dispatcher is wired and waiting for the first event.
//! - **Running**: at least one event has been handled.
//! - **Stopped**: [`WatchHandle::stop`] was called or the watcher died.
//!   Operations already in the queue still run to completion. With a
//!   notify log configured, the final batch is written before the state
//!   changes, so it waits for the operations in that batch.
//!
//! Remote failures never end a session; they are logged and the session
//! keeps watching.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use sitesync_core::config::Config;
use sitesync_core::domain::newtypes::{PublishMode, RemotePath, SessionId};
use sitesync_core::ports::{IIgnoreFilter, IRemoteStore};
use tokio::sync::{mpsc, watch as state_channel};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use crate::dispatcher::{DispatcherOptions, MoveSettled, SyncDispatcher};
use crate::initial::{InitialSyncRunner, UploadOptions};
use crate::notify_log::{NotifyLogger, DEFAULT_NOTIFY_DEBOUNCE};
use crate::path::PathTranslator;
use crate::queue::TaskQueue;
use crate::watcher::{DebouncedEventQueue, FileWatcher, WatchEvent};
use crate::SyncError;

/// Default quiet period for add/change/unlink events
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Options for one watch session
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Publish mode for every upload
    pub mode: PublishMode,
    /// Directory the ignore rules were evaluated against, for logging
    pub cwd: Option<PathBuf>,
    /// Mirror local deletions as remote deletes
    pub remove: bool,
    /// Skip the one-shot upload at startup
    pub disable_initial: bool,
    /// Append a batched action log to this file
    pub notify: Option<PathBuf>,
    /// Watcher quiet period
    pub debounce: Duration,
    /// Notify log quiet period
    pub notify_debounce: Duration,
    /// Extension allow-list for the initial upload
    pub allowed_extensions: Vec<String>,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            mode: PublishMode::default(),
            cwd: None,
            remove: false,
            disable_initial: false,
            notify: None,
            debounce: DEFAULT_DEBOUNCE,
            notify_debounce: DEFAULT_NOTIFY_DEBOUNCE,
            allowed_extensions: Vec::new(),
        }
    }
}

impl WatchOptions {
    /// Takes mode, timings and the allow-list from the `sync` section
    pub fn from_config(config: &Config) -> Self {
        Self {
            mode: config.sync.mode,
            debounce: Duration::from_millis(config.sync.debounce_ms),
            notify_debounce: Duration::from_millis(config.sync.notify_debounce_ms),
            allowed_extensions: config.sync.allowed_extensions.clone(),
            ..Self::default()
        }
    }
}

/// Lifecycle state of a watch session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    Initializing,
    Ready,
    Running,
    Stopped,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Initializing => "initializing",
            SessionState::Ready => "ready",
            SessionState::Running => "running",
            SessionState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Handle to a live watch session
pub struct WatchHandle {
    id: SessionId,
    root: PathBuf,
    state: state_channel::Receiver<SessionState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl WatchHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Canonical local root being watched
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Waits until the session has reached `state` or a later one
    ///
    /// Returns false if the session ended before getting there.
    pub async fn wait_for(&self, state: SessionState) -> bool {
        let mut rx = self.state.clone();
        let reached = rx.wait_for(|current| *current >= state).await.is_ok();
        reached
    }

    /// Stops feeding new events; queued operations keep running
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Waits for the session task to finish
    pub async fn join(self) {
        if let Err(err) = self.task.await {
            error!(session = %self.id, error = %err, "Watch session task failed");
        }
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("id", &self.id)
            .field("root", &self.root)
            .field("state", &self.state())
            .finish()
    }
}

/// Starts mirroring `src` to `dest` and returns immediately
///
/// `src` is canonicalized once; that form is the prefix stripped from
/// every watched path.
///
/// # Errors
/// - [`SyncError::NotADirectory`] if `src` is not a directory
/// - [`SyncError::IoError`] if `src` cannot be resolved
/// - [`SyncError::Watcher`] if the OS watch cannot be set up
pub async fn watch(
    store: Arc<dyn IRemoteStore>,
    queue: TaskQueue,
    src: &Path,
    dest: RemotePath,
    options: WatchOptions,
    ignore: Arc<dyn IIgnoreFilter>,
) -> Result<WatchHandle, SyncError> {
    let root = tokio::fs::canonicalize(src).await?;
    if !tokio::fs::metadata(&root).await?.is_dir() {
        return Err(SyncError::NotADirectory(src.to_path_buf()));
    }

    let (watcher, events) = FileWatcher::start(&root)?;

    let id = SessionId::new();
    let (state_tx, state_rx) = state_channel::channel(SessionState::Initializing);
    let cancel = CancellationToken::new();

    let span = tracing::info_span!(
        "watch_session",
        session = %id,
        identity = %store.identity(),
        root = %root.display(),
        dest = %dest
    );

    let session = Session {
        store,
        queue,
        translator: PathTranslator::new(&root, dest),
        ignore,
        options,
        state: state_tx,
        cancel: cancel.clone(),
    };
    let task = tokio::spawn(session.run(watcher, events).instrument(span));

    Ok(WatchHandle {
        id,
        root,
        state: state_rx,
        cancel,
        task,
    })
}

struct Session {
    store: Arc<dyn IRemoteStore>,
    queue: TaskQueue,
    translator: PathTranslator,
    ignore: Arc<dyn IIgnoreFilter>,
    options: WatchOptions,
    state: state_channel::Sender<SessionState>,
    cancel: CancellationToken,
}

impl Session {
    async fn run(self, watcher: FileWatcher, mut events: mpsc::Receiver<WatchEvent>) {
        info!(
            remove = self.options.remove,
            mode = %self.options.mode,
            cwd = ?self.options.cwd,
            "Watch session starting"
        );

        if self.options.disable_initial {
            debug!("Initial upload disabled");
        } else {
            self.initial_upload().await;
        }

        let notify = NotifyLogger::from_option(self.options.notify.clone(), self.options.notify_debounce);
        let (mut dispatcher, mut settled_rx) = SyncDispatcher::new(
            Arc::clone(&self.store),
            self.queue.clone(),
            self.translator.clone(),
            Arc::clone(&self.ignore),
            DispatcherOptions {
                mode: self.options.mode,
                remove: self.options.remove,
            },
            notify,
        );

        let mut debounced = DebouncedEventQueue::new(self.options.debounce);
        let mut tick = tokio::time::interval(poll_interval(self.options.debounce));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        self.set_state(SessionState::Ready);
        info!("Watch session ready");

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!("Watch session cancelled");
                    break;
                }

                Some(settled) = settled_rx.recv() => {
                    dispatcher.apply_settled(settled);
                }

                event = events.recv() => match event {
                    Some(WatchEvent::Moved(path)) => {
                        self.handle(&mut dispatcher, WatchEvent::Moved(path));
                    }
                    Some(event) => debounced.push(event),
                    None => {
                        warn!("File watcher channel closed");
                        break;
                    }
                },

                _ = tick.tick() => {
                    for event in debounced.poll() {
                        self.handle(&mut dispatcher, event);
                    }
                }
            }
        }

        let dropped = debounced.clear();
        if dropped > 0 {
            debug!(dropped, "Discarded pending events on stop");
        }
        drain_settled(&mut dispatcher, &mut settled_rx);
        watcher.stop();
        dispatcher.close().await;

        self.set_state(SessionState::Stopped);
        info!("Watch session stopped");
    }

    async fn initial_upload(&self) {
        let runner = InitialSyncRunner::new(
            Arc::clone(&self.store),
            self.queue.clone(),
            self.translator.clone(),
            Arc::clone(&self.ignore),
            UploadOptions {
                mode: self.options.mode,
                allowed_extensions: self.options.allowed_extensions.clone(),
            },
        );

        match runner.run().await {
            Ok(report) => info!(
                uploaded = report.uploaded,
                skipped = report.skipped,
                failed = report.failures.len(),
                "Initial upload finished"
            ),
            Err(err) => error!(
                identity = %self.store.identity(),
                error = %err,
                "Initial upload aborted"
            ),
        }
    }

    fn handle(&self, dispatcher: &mut SyncDispatcher, event: WatchEvent) {
        let path = event.path().to_path_buf();
        match dispatcher.dispatch(event) {
            Ok(_) => self.set_state(SessionState::Running),
            Err(err) => error!(path = %path.display(), error = %err, "Could not dispatch event"),
        }
    }

    fn set_state(&self, state: SessionState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            debug!(from = %current, to = %state, "Session state change");
            *current = state;
            true
        });
    }
}

fn drain_settled(dispatcher: &mut SyncDispatcher, rx: &mut mpsc::UnboundedReceiver<MoveSettled>) {
    while let Ok(settled) = rx.try_recv() {
        dispatcher.apply_settled(settled);
    }
}

fn poll_interval(debounce: Duration) -> Duration {
    (debounce / 2).clamp(Duration::from_millis(10), Duration::from_millis(250))
}
