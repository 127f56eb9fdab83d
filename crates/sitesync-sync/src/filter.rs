//! Gitignore-style ignore filter
//!
//! Rules come from a fixed default set plus the lines of an ignore file
//! (`.syncignore` by default) in the working directory. Paths are matched
//! relative to that directory; anything outside it is never ignored.

use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use sitesync_core::ports::IIgnoreFilter;
use tracing::debug;

use crate::SyncError;

/// Patterns applied before any ignore file
pub const DEFAULT_PATTERNS: &[&str] = &[".git/", "node_modules/", ".DS_Store", "*.swp", "*~"];

/// Ignore predicate backed by compiled gitignore rules
#[derive(Debug, Clone)]
pub struct GitignoreFilter {
    root: PathBuf,
    matcher: Gitignore,
}

impl GitignoreFilter {
    /// Default patterns plus `<cwd>/<ignore_file>` when that file exists
    pub fn new(cwd: &Path, ignore_file: &str) -> Result<Self, SyncError> {
        let mut builder = GitignoreBuilder::new(cwd);
        for pattern in DEFAULT_PATTERNS {
            builder.add_line(None, pattern)?;
        }

        let file = cwd.join(ignore_file);
        if file.is_file() {
            if let Some(err) = builder.add(&file) {
                return Err(err.into());
            }
            debug!(path = %file.display(), "Loaded ignore file");
        }

        Ok(Self {
            root: cwd.to_path_buf(),
            matcher: builder.build()?,
        })
    }

    /// Only the given patterns, no defaults and no ignore file
    pub fn from_patterns<I, S>(cwd: &Path, patterns: I) -> Result<Self, SyncError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GitignoreBuilder::new(cwd);
        for pattern in patterns {
            builder.add_line(None, pattern.as_ref())?;
        }
        Ok(Self {
            root: cwd.to_path_buf(),
            matcher: builder.build()?,
        })
    }

    /// Number of compiled rules
    pub fn rule_count(&self) -> usize {
        self.matcher.num_ignores() as usize
    }
}

impl IIgnoreFilter for GitignoreFilter {
    fn is_ignored(&self, path: &Path) -> bool {
        if !path.starts_with(&self.root) {
            return false;
        }
        self.matcher
            .matched_path_or_any_parents(path, path.is_dir())
            .is_ignore()
    }
}
