//! Subcommand implementations and the setup they share

pub mod completions;
pub mod config;
pub mod upload;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use sitesync_core::config::Config;
use sitesync_core::domain::newtypes::{PublishMode, RemotePath};
use sitesync_core::ports::IIgnoreFilter;
use sitesync_remote::HttpRemoteStore;
use sitesync_sync::GitignoreFilter;

use crate::output::{Output, OutputFormat};

/// Flags accepted by every subcommand
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub format: OutputFormat,
    pub config: Option<PathBuf>,
    pub quiet: bool,
}

impl GlobalOptions {
    /// `--config` if given, otherwise the platform default
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Loads the config file; a missing file at the default location
    /// yields the defaults, a missing `--config` file is an error
    pub fn load_config(&self) -> Result<Config> {
        let path = self.config_path();
        if self.config.is_none() && !path.exists() {
            return Ok(Config::default());
        }
        Config::load(&path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))
    }

    pub fn formatter(&self) -> Output {
        Output::new(self.format, self.quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }
}

/// Arguments naming the remote side, shared by `watch` and `upload`
#[derive(Debug, Clone, clap::Args)]
pub struct RemoteArgs {
    /// Site to publish to (overrides `remote.site`)
    #[arg(long)]
    pub site: Option<String>,

    /// Publish mode for uploads (overrides `sync.mode`)
    #[arg(long, value_parser = parse_mode)]
    pub mode: Option<PublishMode>,

    /// Directory ignore rules are read from and evaluated against
    #[arg(long)]
    pub cwd: Option<PathBuf>,
}

fn parse_mode(s: &str) -> std::result::Result<PublishMode, String> {
    s.parse().map_err(|e: sitesync_core::domain::DomainError| e.to_string())
}

pub fn parse_remote(s: &str) -> std::result::Result<RemotePath, String> {
    RemotePath::new(s).map_err(|e| e.to_string())
}

impl RemoteArgs {
    /// Builds the HTTP store, reading the token from `remote.token_env`
    pub fn store(&self, config: &Config) -> Result<HttpRemoteStore> {
        let mut remote = config.remote.clone();
        if let Some(site) = &self.site {
            remote.site = site.clone();
        }
        if remote.site.trim().is_empty() {
            anyhow::bail!("No site configured; set remote.site or pass --site");
        }

        let token = std::env::var(&remote.token_env).with_context(|| {
            format!(
                "Environment variable {} must hold the API token",
                remote.token_env
            )
        })?;

        HttpRemoteStore::from_config(&remote, token)
    }

    /// Loads the ignore rules from `--cwd` or the current directory
    pub fn ignore_filter(&self, config: &Config) -> Result<Arc<dyn IIgnoreFilter>> {
        let cwd = self.cwd()?;
        let filter = GitignoreFilter::new(&cwd, &config.sync.ignore_file)
            .with_context(|| format!("Failed to read ignore rules in {}", cwd.display()))?;
        Ok(Arc::new(filter))
    }

    /// Canonical form, so it shares a prefix with the canonical source root
    pub fn cwd(&self) -> Result<PathBuf> {
        let dir = match &self.cwd {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("Failed to determine current directory")?,
        };
        std::fs::canonicalize(&dir).with_context(|| format!("Cannot access {}", dir.display()))
    }

    pub fn mode_or(&self, configured: PublishMode) -> PublishMode {
        self.mode.unwrap_or(configured)
    }
}

/// Resolves SRC to its canonical form, failing early when it is not a directory
pub fn source_root(path: &Path) -> Result<PathBuf> {
    let root = std::fs::canonicalize(path)
        .with_context(|| format!("Cannot access {}", path.display()))?;
    if !root.is_dir() {
        anyhow::bail!("{} is not a directory", path.display());
    }
    Ok(root)
}
