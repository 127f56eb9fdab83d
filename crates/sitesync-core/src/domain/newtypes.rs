//! Domain newtypes with validation
//!
//! Strongly-typed wrappers for the values that cross the boundary between
//! the local tree and the remote store. Each newtype ensures validity at
//! construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// SessionId
// ============================================================================

/// Identifier of one `watch` or `upload` invocation, attached to its tracing span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random SessionId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid SessionId: {e}")))
    }
}

// ============================================================================
// RemotePath
// ============================================================================

/// A path in the remote store (always absolute, always `/`-separated)
///
/// e.g. `/site/assets/app.js`. Host path separators never appear here;
/// translation from local paths happens in the sync engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemotePath(String);

impl RemotePath {
    /// Create a new RemotePath
    ///
    /// A single trailing slash is dropped, so `/site/` and `/site` are the
    /// same destination root.
    ///
    /// # Errors
    /// Returns error if the path is relative, contains empty segments or
    /// contains a `.`/`..` segment
    pub fn new(path: impl Into<String>) -> Result<Self, DomainError> {
        let mut path = path.into();

        if !path.starts_with('/') {
            return Err(DomainError::InvalidRemotePath(format!(
                "Remote path must start with '/': {path}"
            )));
        }

        if path.len() > 1 && path.ends_with('/') {
            path.pop();
        }

        if path.len() > 1 {
            for segment in path[1..].split('/') {
                if segment.is_empty() {
                    return Err(DomainError::InvalidRemotePath(format!(
                        "Remote path contains invalid double slashes: {path}"
                    )));
                }
                if segment == "." || segment == ".." {
                    return Err(DomainError::InvalidRemotePath(format!(
                        "Remote path contains invalid traversal: {path}"
                    )));
                }
            }
        }

        Ok(Self(path))
    }

    /// Create the root path "/"
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for "/"
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Join a single path component
    ///
    /// # Errors
    /// Returns error if component is empty, contains `/`, or is `.`/`..`
    pub fn join(&self, component: &str) -> Result<Self, DomainError> {
        if component.is_empty() || component.contains('/') || component == "." || component == ".."
        {
            return Err(DomainError::InvalidRemotePath(format!(
                "Invalid path component: {component}"
            )));
        }

        let new_path = if self.is_root() {
            format!("/{component}")
        } else {
            format!("{}/{component}", self.0)
        };

        Ok(Self(new_path))
    }
}

impl Display for RemotePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RemotePath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RemotePath {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RemotePath> for String {
    fn from(path: RemotePath) -> Self {
        path.0
    }
}

// ============================================================================
// PublishMode
// ============================================================================

/// How uploaded content is published on the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishMode {
    /// Stage the content without making it publicly visible
    Draft,
    /// Publish immediately
    #[default]
    Live,
}

impl PublishMode {
    /// Wire representation, also used as the `mode` query parameter
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishMode::Draft => "draft",
            PublishMode::Live => "live",
        }
    }
}

impl Display for PublishMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PublishMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "draft" => Ok(PublishMode::Draft),
            "live" => Ok(PublishMode::Live),
            other => Err(DomainError::ValidationFailed(format!(
                "unknown publish mode '{other}' (expected draft or live)"
            ))),
        }
    }
}
