//! Local → remote path translation
//!
//! Maps an absolute local path under the watched root onto the remote
//! destination root. The result always uses `/` separators, whatever the
//! host OS uses.

use std::path::{Component, Path, PathBuf};

use sitesync_core::domain::newtypes::RemotePath;

use crate::SyncError;

/// Translates `local` (a descendant of `src_root`) into a path under `dest_root`
///
/// `src_root` must use the same absolute representation the watcher was
/// started with; the prefix is stripped component by component, so
/// `/proj` never matches `/project/a.html`.
///
/// # Errors
/// [`SyncError::OutsideRoot`] if `local` is not under `src_root`. Callers
/// only pass paths observed under the root, so this indicates a bug.
pub fn translate(
    local: &Path,
    src_root: &Path,
    dest_root: &RemotePath,
) -> Result<RemotePath, SyncError> {
    let outside = || SyncError::OutsideRoot {
        path: local.to_path_buf(),
        root: src_root.to_path_buf(),
    };

    let relative = local.strip_prefix(src_root).map_err(|_| outside())?;

    let mut remote = dest_root.clone();
    for component in relative.components() {
        match component {
            Component::Normal(name) => {
                remote = remote.join(&name.to_string_lossy())?;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(outside());
            }
        }
    }

    Ok(remote)
}

/// A source root bound to its remote destination
#[derive(Debug, Clone)]
pub struct PathTranslator {
    src_root: PathBuf,
    dest_root: RemotePath,
}

impl PathTranslator {
    pub fn new(src_root: impl Into<PathBuf>, dest_root: RemotePath) -> Self {
        Self {
            src_root: src_root.into(),
            dest_root,
        }
    }

    pub fn src_root(&self) -> &Path {
        &self.src_root
    }

    pub fn dest_root(&self) -> &RemotePath {
        &self.dest_root
    }

    /// See [`translate`]
    pub fn translate(&self, local: &Path) -> Result<RemotePath, SyncError> {
        translate(local, &self.src_root, &self.dest_root)
    }
}
