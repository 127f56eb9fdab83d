//! Raw "moved" notification pairing
//!
//! The OS watcher reports a rename as two independent raw notifications:
//! the vanished path, then the appeared path. [`MoveCorrelator`] buffers
//! them and pairs the two oldest into one [`RenameEvent`], so the engine
//! issues a single remote move instead of a delete plus an upload.
//!
//! While a rename is in flight, the paths it touches (and, for folders,
//! their immediate children) are marked so that the add/unlink side
//! effects of the same OS rename can be suppressed.
//!
//! Pairing is strictly first-in first-out over one buffer per session.
//! Two renames whose raw notifications interleave are paired in arrival
//! order, which may mismatch them.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// A logical rename synthesized from two raw "moved" notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameEvent {
    /// First path seen (conventionally the vanished one)
    pub old: PathBuf,
    /// Second path seen (conventionally the appeared one)
    pub new: PathBuf,
}

/// Session-scoped move correlation state
#[derive(Debug, Default)]
pub struct MoveCorrelator {
    /// Raw "moved" paths not yet paired, oldest first
    raw: VecDeque<PathBuf>,
    /// Paths currently marked as part of an in-flight move
    marks: HashSet<PathBuf>,
    /// Every raw path seen, popped two at a time as renames settle
    tracked: VecDeque<PathBuf>,
}

impl MoveCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one raw "moved" notification for `path`
    ///
    /// A directory is marked together with its immediate children. Any
    /// other path, including one that no longer exists because it is the
    /// vanished half of a rename, is marked on its own.
    ///
    /// Returns a rename once two raw notifications are buffered.
    pub fn observe_moved(&mut self, path: &Path) -> Option<RenameEvent> {
        if path.is_dir() {
            self.push(path);
            self.mark_children(path);
        } else {
            self.push(path);
        }

        if self.raw.len() < 2 {
            debug!(path = %path.display(), "Buffered raw move notification");
            return None;
        }

        let old = self.raw.pop_front()?;
        let new = self.raw.pop_front()?;
        debug!(old = %old.display(), new = %new.display(), "Paired raw move notifications");
        Some(RenameEvent { old, new })
    }

    fn push(&mut self, path: &Path) {
        self.raw.push_back(path.to_path_buf());
        self.tracked.push_back(path.to_path_buf());
        self.marks.insert(path.to_path_buf());
    }

    fn mark_children(&mut self, dir: &Path) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(
                    path = %dir.display(),
                    error = %err,
                    "Could not list moved folder, children are not marked"
                );
                return;
            }
        };

        let mut marked = 0usize;
        for entry in entries.flatten() {
            self.marks.insert(entry.path());
            marked += 1;
        }
        debug!(path = %dir.display(), children = marked, "Marked moved folder children");
    }

    /// Returns true if `path` itself is marked
    pub fn is_marked(&self, path: &Path) -> bool {
        self.marks.contains(path)
    }

    /// Returns true if `path` or its parent is marked
    ///
    /// Add and unlink events for such a path are byproducts of a move the
    /// engine is already mirroring.
    pub fn is_suppressed(&self, path: &Path) -> bool {
        self.is_marked(path) || path.parent().is_some_and(|parent| self.is_marked(parent))
    }

    /// Releases bookkeeping once the remote move for `old` → `new` settled
    ///
    /// Clears every mark whose path text contains both `old` and `new`,
    /// then drops the two oldest tracked paths. Returns how many marks were
    /// cleared.
    ///
    /// Marks for plain sibling renames (`/a/x.js` → `/a/y.js`) contain only
    /// one of the two strings and therefore stay set.
    pub fn settle(&mut self, old: &Path, new: &Path) -> usize {
        let old = old.to_string_lossy();
        let new = new.to_string_lossy();

        let before = self.marks.len();
        self.marks.retain(|mark| {
            let text = mark.to_string_lossy();
            !(text.contains(old.as_ref()) && text.contains(new.as_ref()))
        });
        let cleared = before - self.marks.len();

        self.tracked.pop_front();
        self.tracked.pop_front();

        debug!(old = %old, new = %new, cleared, "Settled move bookkeeping");
        cleared
    }

    /// Raw notifications waiting for a partner
    pub fn buffered(&self) -> usize {
        self.raw.len()
    }

    /// Number of marked paths
    pub fn marked(&self) -> usize {
        self.marks.len()
    }

    /// Number of raw paths not yet released by [`settle`](Self::settle)
    pub fn tracked(&self) -> usize {
        self.tracked.len()
    }
}
