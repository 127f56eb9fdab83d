//! File watching and debounced event queue
//!
//! Provides a [`FileWatcher`] that wraps the `notify` crate to monitor the
//! source tree, converting raw OS events into [`WatchEvent`] values.
//!
//! The [`DebouncedEventQueue`] collects rapid-fire events and coalesces
//! them so that the dispatcher only sees the final state of a path after
//! it has been quiet for the debounce window. Raw [`WatchEvent::Moved`]
//! notifications bypass it: move marks must be recorded before any
//! debounced add or unlink for the same paths is dispatched.
//!
//! ## Architecture
//!
//! ```text
//! inotify / FSEvents
//!       │
//!       ▼
//!  FileWatcher ──→ mpsc ──┬── Moved ─────────────────────────→ SyncDispatcher
//!                         └── Add/Change/Unlink/UnlinkDir ──→ DebouncedEventQueue ──→ SyncDispatcher
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::SyncError;

// ============================================================================
// WatchEvent
// ============================================================================

/// A filesystem change as seen by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A file appeared
    Add(PathBuf),
    /// A file's content or metadata changed
    Change(PathBuf),
    /// A file was removed
    Unlink(PathBuf),
    /// A directory was removed
    UnlinkDir(PathBuf),
    /// Raw rename notification for one side of a rename
    Moved(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Add(p)
            | WatchEvent::Change(p)
            | WatchEvent::Unlink(p)
            | WatchEvent::UnlinkDir(p)
            | WatchEvent::Moved(p) => p,
        }
    }

    /// Short action name, as written to the notify log
    pub fn action(&self) -> &'static str {
        match self {
            WatchEvent::Add(_) => "add",
            WatchEvent::Change(_) => "change",
            WatchEvent::Unlink(_) => "unlink",
            WatchEvent::UnlinkDir(_) => "unlinkDir",
            WatchEvent::Moved(_) => "moved",
        }
    }
}

// ============================================================================
// FileWatcher
// ============================================================================

/// Watches the source tree recursively using the OS-native mechanism
///
/// Only changes made after the watcher starts are reported; existing
/// files are never replayed. Dropping the watcher stops the OS watch.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    /// Starts watching `root` recursively
    ///
    /// Returns the watcher and the receiver yielding mapped events.
    ///
    /// # Errors
    /// [`SyncError::Watcher`] if the OS watcher cannot be created or the
    /// root cannot be watched (missing path, inotify limit reached, ...)
    pub fn start(root: &Path) -> Result<(Self, mpsc::Receiver<WatchEvent>), SyncError> {
        let (event_tx, event_rx) = mpsc::channel::<WatchEvent>(1024);

        info!(path = %root.display(), "Starting recursive watch");

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    for mapped in map_notify_event(&event) {
                        if let Err(e) = event_tx.blocking_send(mapped) {
                            warn!(error = %e, "Failed to send watch event (receiver dropped)");
                        }
                    }
                }
                Err(err) => {
                    error!(error = %err, "File watcher error");
                }
            },
            notify::Config::default(),
        )?;

        watcher.watch(root, RecursiveMode::Recursive)?;

        Ok((
            Self {
                watcher,
                root: root.to_path_buf(),
            },
            event_rx,
        ))
    }

    /// Stops the OS-level watch; no further events are produced
    pub fn stop(mut self) {
        info!(path = %self.root.display(), "Stopping watch");
        if let Err(err) = self.watcher.unwatch(&self.root) {
            debug!(path = %self.root.display(), error = %err, "Unwatch failed");
        }
    }
}

// ============================================================================
// Event mapping - notify::Event → WatchEvent
// ============================================================================

/// Converts a `notify::Event` into engine events
///
/// - `Create(Folder)` is dropped; directories are never uploaded
/// - `Create(_)` → `Add`
/// - `Modify(Name(From | To | Any))` → one `Moved` per path
/// - `Modify(Name(Both))` is dropped; its From and To halves were reported
/// - other `Modify(_)` → `Change`
/// - `Remove(Folder)` → `UnlinkDir`, other `Remove(_)` → `Unlink`
/// - access and other events are dropped
pub(crate) fn map_notify_event(event: &notify::Event) -> Vec<WatchEvent> {
    let paths = &event.paths;

    match &event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),

        EventKind::Create(_) => paths.iter().cloned().map(WatchEvent::Add).collect(),

        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            debug!(paths = ?paths, "Dropping paired rename notification");
            Vec::new()
        }

        EventKind::Modify(ModifyKind::Name(_)) => {
            paths.iter().cloned().map(WatchEvent::Moved).collect()
        }

        EventKind::Modify(_) => paths.iter().cloned().map(WatchEvent::Change).collect(),

        EventKind::Remove(RemoveKind::Folder) => {
            paths.iter().cloned().map(WatchEvent::UnlinkDir).collect()
        }

        EventKind::Remove(_) => paths.iter().cloned().map(WatchEvent::Unlink).collect(),

        _ => Vec::new(),
    }
}

// ============================================================================
// DebouncedEventQueue
// ============================================================================

/// Queue that coalesces rapid filesystem events per path
///
/// When several events arrive for the same path in quick succession, only
/// the latest is kept and its timestamp is reset. Events are emitted by
/// [`poll`](DebouncedEventQueue::poll) once they have been quiet for longer
/// than the debounce delay, oldest first.
pub struct DebouncedEventQueue {
    pending: HashMap<PathBuf, (WatchEvent, Instant)>,
    debounce_delay: Duration,
}

impl DebouncedEventQueue {
    pub fn new(debounce_delay: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            debounce_delay,
        }
    }

    /// Inserts or replaces the pending event for the event's path
    ///
    /// A `Change` following a pending `Add` keeps the `Add`: a new file
    /// stays an add however many writes it takes to settle.
    pub fn push(&mut self, event: WatchEvent) {
        let now = Instant::now();
        let path = event.path().to_path_buf();
        if let Some((pending, at)) = self.pending.get_mut(&path) {
            if matches!(pending, WatchEvent::Add(_)) && matches!(event, WatchEvent::Change(_)) {
                *at = now;
                return;
            }
        }
        self.pending.insert(path, (event, now));
    }

    /// Removes and returns every event that has been quiet long enough
    pub fn poll(&mut self) -> Vec<WatchEvent> {
        let now = Instant::now();
        let settled_paths: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, (_, at))| now.duration_since(*at) >= self.debounce_delay)
            .map(|(path, _)| path.clone())
            .collect();

        let mut settled: Vec<(WatchEvent, Instant)> = settled_paths
            .iter()
            .filter_map(|path| self.pending.remove(path))
            .collect();
        settled.sort_by_key(|(_, at)| *at);

        if !settled.is_empty() {
            debug!(count = settled.len(), "Polled settled watch events");
        }

        settled.into_iter().map(|(event, _)| event).collect()
    }

    /// Drops every pending event
    pub fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
