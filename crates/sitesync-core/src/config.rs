//! Configuration module for sitesync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::newtypes::PublishMode;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for sitesync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

/// Remote store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the content store API.
    pub endpoint: String,
    /// Remote identity (site name) every request is made for.
    pub site: String,
    /// Name of the environment variable holding the bearer token.
    pub token_env: String,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum number of remote operations in flight at once.
    pub concurrency: usize,
    /// Milliseconds a path must be quiet before its watcher event is dispatched.
    pub debounce_ms: u64,
    /// Milliseconds of silence before the notify log flushes a batch.
    pub notify_debounce_ms: u64,
    /// File extensions (without the dot) uploaded by the initial sync.
    /// An empty list allows every extension.
    pub allowed_extensions: Vec<String>,
    /// Name of the gitignore-style file read from the working directory.
    pub ignore_file: String,
    /// Publish mode used for uploads.
    pub mode: PublishMode,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/sitesync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("sitesync")
            .join("config.yaml")
    }

    /// Returns true if `path` carries an extension from the allow-list.
    ///
    /// Matching is case-insensitive; an empty allow-list accepts everything.
    pub fn extension_allowed(&self, path: &Path) -> bool {
        extension_allowed(&self.sync.allowed_extensions, path)
    }
}

/// Returns true if `path`'s extension is in `allowed` (case-insensitive,
/// leading dots in the list are ignored). An empty list allows everything.
pub fn extension_allowed(allowed: &[String], path: &Path) -> bool {
    if allowed.is_empty() {
        return true;
    }
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    allowed
        .iter()
        .any(|a| a.trim_start_matches('.').eq_ignore_ascii_case(ext))
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Default number of concurrent remote operations.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Extensions uploaded by default: the usual static-site payload.
const DEFAULT_EXTENSIONS: &[&str] = &[
    "html", "htm", "css", "js", "mjs", "json", "map", "xml", "txt", "md", "svg", "png", "jpg",
    "jpeg", "gif", "webp", "avif", "ico", "woff", "woff2", "ttf", "otf", "eot", "pdf", "mp4",
    "webm", "mp3", "wasm", "csv",
];

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.example.com/v1".to_string(),
            site: String::new(),
            token_env: "SITESYNC_TOKEN".to_string(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            debounce_ms: 100,
            notify_debounce_ms: 500,
            allowed_extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            ignore_file: ".syncignore".to_string(),
            mode: PublishMode::Live,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.concurrency"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid. `remote.site` is
    /// not checked here because the CLI may supply it per invocation.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- remote ---
        if !(self.remote.endpoint.starts_with("http://")
            || self.remote.endpoint.starts_with("https://"))
        {
            errors.push(ValidationError {
                field: "remote.endpoint".into(),
                message: format!("must be an http(s) URL, got '{}'", self.remote.endpoint),
            });
        }
        if self.remote.token_env.trim().is_empty() {
            errors.push(ValidationError {
                field: "remote.token_env".into(),
                message: "must name an environment variable".into(),
            });
        }

        // --- sync ---
        if self.sync.concurrency == 0 {
            errors.push(ValidationError {
                field: "sync.concurrency".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.debounce_ms == 0 {
            errors.push(ValidationError {
                field: "sync.debounce_ms".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.notify_debounce_ms == 0 {
            errors.push(ValidationError {
                field: "sync.notify_debounce_ms".into(),
                message: "must be greater than 0".into(),
            });
        }
        if let Some(bad) = self
            .sync
            .allowed_extensions
            .iter()
            .find(|e| e.trim_start_matches('.').is_empty() || e.contains('/'))
        {
            errors.push(ValidationError {
                field: "sync.allowed_extensions".into(),
                message: format!("invalid extension '{bad}'"),
            });
        }
        if self.sync.ignore_file.trim().is_empty() {
            errors.push(ValidationError {
                field: "sync.ignore_file".into(),
                message: "must not be empty".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust
/// use sitesync_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .remote_site("my-site")
///     .sync_concurrency(4)
///     .logging_level("debug")
///     .build();
/// assert_eq!(config.sync.concurrency, 4);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- remote ---

    pub fn remote_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.remote.endpoint = endpoint.into();
        self
    }

    pub fn remote_site(mut self, site: impl Into<String>) -> Self {
        self.config.remote.site = site.into();
        self
    }

    pub fn remote_token_env(mut self, name: impl Into<String>) -> Self {
        self.config.remote.token_env = name.into();
        self
    }

    // --- sync ---

    pub fn sync_concurrency(mut self, n: usize) -> Self {
        self.config.sync.concurrency = n;
        self
    }

    pub fn sync_debounce_ms(mut self, ms: u64) -> Self {
        self.config.sync.debounce_ms = ms;
        self
    }

    pub fn sync_notify_debounce_ms(mut self, ms: u64) -> Self {
        self.config.sync.notify_debounce_ms = ms;
        self
    }

    pub fn sync_allowed_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.sync.allowed_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn sync_ignore_file(mut self, name: impl Into<String>) -> Self {
        self.config.sync.ignore_file = name.into();
        self
    }

    pub fn sync_mode(mut self, mode: PublishMode) -> Self {
        self.config.sync.mode = mode;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
