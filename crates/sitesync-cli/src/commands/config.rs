//! Config command - View and manage sitesync configuration
//!
//! Provides the `sitesync config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Sets individual configuration values via dot-notation keys
//! 3. Validates the configuration file and reports errors
//! 4. Writes a default configuration file

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use sitesync_core::config::Config;
use tracing::info;

use super::GlobalOptions;

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "sync.concurrency")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Keys accepted by `config set`
const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("remote.endpoint", "Base URL of the content store API"),
    ("remote.site", "Site every request is made for"),
    ("remote.token_env", "Environment variable holding the API token"),
    ("sync.concurrency", "Remote operations in flight at once"),
    ("sync.debounce_ms", "Watcher quiet period (ms)"),
    ("sync.notify_debounce_ms", "Notify log quiet period (ms)"),
    ("sync.allowed_extensions", "Comma-separated list, empty for all"),
    ("sync.ignore_file", "Ignore rules file name"),
    ("sync.mode", "draft|live"),
    ("logging.level", "trace|debug|info|warn|error"),
];

impl ConfigCommand {
    /// Execute the config command
    pub async fn execute(&self, globals: &GlobalOptions) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(globals).await,
            ConfigCommand::Set { key, value } => self.execute_set(key, value, globals).await,
            ConfigCommand::Validate => self.execute_validate(globals).await,
            ConfigCommand::Init { force } => self.execute_init(*force, globals).await,
        }
    }

    async fn execute_show(&self, globals: &GlobalOptions) -> Result<()> {
        let formatter = globals.formatter();
        let config_path = globals.config_path();
        let config = globals.load_config()?;

        info!(config_path = %config_path.display(), "Showing configuration");

        if globals.is_json() {
            let json = serde_json::to_value(&config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Configuration ({})", config_path.display()));
            formatter.info("");

            let yaml = serde_yaml::to_string(&config)
                .context("Failed to serialize configuration to YAML")?;
            for line in yaml.lines() {
                formatter.info(line);
            }
        }

        Ok(())
    }

    async fn execute_set(&self, key: &str, value: &str, globals: &GlobalOptions) -> Result<()> {
        let formatter = globals.formatter();
        let config_path = globals.config_path();
        let mut config = Config::load_or_default(&config_path);

        info!(key = %key, value = %value, "Setting configuration value");

        if let Err(e) = apply_config_value(&mut config, key, value) {
            if globals.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "value": value,
                    "error": e.to_string(),
                }));
            } else {
                formatter.error(&format!("Failed to set '{}': {}", key, e));
                formatter.info("");
                formatter.info("Supported keys:");
                for (name, help) in SUPPORTED_KEYS {
                    formatter.info(&format!("  {:<26} - {}", name, help));
                }
            }
            return Ok(());
        }

        let errors = config.validate();
        if !errors.is_empty() {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            if globals.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "value": value,
                    "errors": messages,
                }));
            } else {
                formatter.error(&format!(
                    "Invalid value for '{}': {}",
                    key,
                    messages.join("; ")
                ));
            }
            return Ok(());
        }

        write_config(&config_path, &config)?;

        if globals.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "key": key,
                "value": value,
                "config_path": config_path.display().to_string(),
            }));
        } else {
            formatter.success(&format!("Set {} = {}", key, value));
            formatter.info(&format!("Saved to {}", config_path.display()));
        }
        Ok(())
    }

    async fn execute_validate(&self, globals: &GlobalOptions) -> Result<()> {
        let formatter = globals.formatter();
        let config_path = globals.config_path();

        if !config_path.exists() {
            if globals.is_json() {
                formatter.print_json(&serde_json::json!({
                    "valid": false,
                    "config_path": config_path.display().to_string(),
                    "errors": ["Configuration file not found. Using defaults."],
                }));
            } else {
                formatter.info(&format!(
                    "Configuration file not found at {}",
                    config_path.display()
                ));
                formatter.info("Using default configuration. Run 'sitesync config init' to create one.");
            }
            return Ok(());
        }

        let config = match Config::load(&config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                if globals.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "valid": false,
                        "config_path": config_path.display().to_string(),
                        "errors": [format!("Failed to parse configuration: {}", e)],
                    }));
                } else {
                    formatter.error(&format!("Failed to parse configuration: {}", e));
                    formatter.info(&format!("File: {}", config_path.display()));
                }
                return Ok(());
            }
        };

        info!(config_path = %config_path.display(), "Validating configuration");

        let mut errors = config.validate();
        if config.remote.site.trim().is_empty() {
            errors.push(sitesync_core::config::ValidationError {
                field: "remote.site".into(),
                message: "not set; pass --site to every command".into(),
            });
        }

        if globals.is_json() {
            let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            formatter.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": config_path.display().to_string(),
                "errors": error_strings,
            }));
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", config_path.display()));
        } else {
            formatter.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ));
            formatter.info(&format!("File: {}", config_path.display()));
            formatter.info("");
            for error in &errors {
                formatter.info(&format!("  {} - {}", error.field, error.message));
            }
        }

        Ok(())
    }

    async fn execute_init(&self, force: bool, globals: &GlobalOptions) -> Result<()> {
        let formatter = globals.formatter();
        let config_path = globals.config_path();

        if config_path.exists() && !force {
            anyhow::bail!(
                "{} already exists; pass --force to overwrite it",
                config_path.display()
            );
        }

        write_config(&config_path, &Config::default())?;
        info!(config_path = %config_path.display(), "Wrote default configuration");

        if globals.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "config_path": config_path.display().to_string(),
            }));
        } else {
            formatter.success(&format!("Wrote {}", config_path.display()));
            formatter.info("Set remote.site and export the token variable before syncing");
        }
        Ok(())
    }
}

fn write_config(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create configuration directory")?;
    }
    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Apply a dot-notation key/value pair to a Config struct
///
/// See [`SUPPORTED_KEYS`] for the accepted keys.
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        // --- remote ---
        "remote.endpoint" => config.remote.endpoint = value.to_string(),
        "remote.site" => config.remote.site = value.to_string(),
        "remote.token_env" => config.remote.token_env = value.to_string(),

        // --- sync ---
        "sync.concurrency" => {
            config.sync.concurrency = value
                .parse::<usize>()
                .context("Expected a positive integer for sync.concurrency")?;
        }
        "sync.debounce_ms" => {
            config.sync.debounce_ms = value
                .parse::<u64>()
                .context("Expected a positive integer for sync.debounce_ms")?;
        }
        "sync.notify_debounce_ms" => {
            config.sync.notify_debounce_ms = value
                .parse::<u64>()
                .context("Expected a positive integer for sync.notify_debounce_ms")?;
        }
        "sync.allowed_extensions" => {
            config.sync.allowed_extensions = value
                .split(',')
                .map(|e| e.trim().trim_start_matches('.').to_string())
                .filter(|e| !e.is_empty())
                .collect();
        }
        "sync.ignore_file" => config.sync.ignore_file = value.to_string(),
        "sync.mode" => {
            config.sync.mode = value.parse().context("Expected draft or live")?;
        }

        // --- logging ---
        "logging.level" => config.logging.level = value.to_string(),

        _ => {
            anyhow::bail!("Unknown configuration key: '{}'", key);
        }
    }

    Ok(())
}
