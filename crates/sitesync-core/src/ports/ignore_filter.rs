//! Ignore predicate port
//!
//! The engine consumes ignore rules as a plain boolean filter; how the
//! rules are written and evaluated is up to the implementation.

use std::path::Path;

/// Decides whether a local path is excluded from synchronization
pub trait IIgnoreFilter: Send + Sync {
    /// Returns true if `path` must be skipped
    fn is_ignored(&self, path: &Path) -> bool;
}

impl<F> IIgnoreFilter for F
where
    F: Fn(&Path) -> bool + Send + Sync,
{
    fn is_ignored(&self, path: &Path) -> bool {
        self(path)
    }
}

/// Filter that never ignores anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIgnore;

impl IIgnoreFilter for NoIgnore {
    fn is_ignored(&self, _path: &Path) -> bool {
        false
    }
}
