//! sitesync CLI - Mirror a local folder to a remote content store
//!
//! Provides commands for:
//! - Watching a folder and mirroring every change
//! - One-shot folder uploads
//! - Viewing and validating configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sitesync_core::config::Config;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    completions::CompletionsCommand, config::ConfigCommand, upload::UploadCommand,
    watch::WatchCommand, GlobalOptions,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "sitesync",
    version,
    about = "Mirror a local folder to a remote content store"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Watch a folder and mirror changes to the remote store
    Watch(WatchCommand),
    /// Upload a folder once
    Upload(UploadCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

/// Picks the log filter: `RUST_LOG` wins, then `-v`/`-q`, then `logging.level`
fn log_filter(verbose: u8, quiet: bool, configured: &str) -> EnvFilter {
    let level = match (verbose, quiet) {
        (0, true) => "warn",
        (0, false) => configured,
        (1, _) => "debug",
        _ => "trace",
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let globals = GlobalOptions {
        format: if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        },
        config: cli.config.clone(),
        quiet: cli.quiet,
    };

    let configured = Config::load_or_default(&globals.config_path()).logging.level;
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose, cli.quiet, &configured))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Watch(cmd) => cmd.execute(&globals).await,
        Commands::Upload(cmd) => cmd.execute(&globals).await,
        Commands::Config(cmd) => cmd.execute(&globals).await,
        Commands::Completions(cmd) => cmd.execute(&globals).await,
    }
}
