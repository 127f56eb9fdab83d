//! Watch command - Mirror a folder until interrupted
//!
//! Provides the `sitesync watch` CLI command which:
//! 1. Uploads the folder once (unless `--no-initial`)
//! 2. Mirrors adds, changes, renames and (with `--remove`) deletions
//! 3. On Ctrl-C stops watching and waits for queued remote work

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sitesync_core::domain::newtypes::RemotePath;
use sitesync_sync::{watch, SessionState, TaskQueue, WatchOptions};
use tracing::info;

use super::{parse_remote, source_root, GlobalOptions, RemoteArgs};

/// Arguments for the watch subcommand
#[derive(Debug, clap::Args)]
pub struct WatchCommand {
    /// Local folder to watch
    pub src: PathBuf,

    /// Remote destination folder, e.g. `/` or `/blog`
    #[arg(value_parser = parse_remote)]
    pub dest: RemotePath,

    /// Delete remote files when their local copy is deleted
    #[arg(long)]
    pub remove: bool,

    /// Skip the initial upload of existing files
    #[arg(long)]
    pub no_initial: bool,

    /// Append a log of completed actions to this file
    #[arg(long, value_name = "FILE")]
    pub notify: Option<PathBuf>,

    #[command(flatten)]
    pub remote: RemoteArgs,
}

impl WatchCommand {
    /// Execute the watch command
    pub async fn execute(&self, globals: &GlobalOptions) -> Result<()> {
        let formatter = globals.formatter();
        let config = globals.load_config()?;

        let src = source_root(&self.src)?;
        let store = Arc::new(self.remote.store(&config)?);
        let ignore = self.remote.ignore_filter(&config)?;
        let queue = TaskQueue::new(config.sync.concurrency);

        let options = WatchOptions {
            mode: self.remote.mode_or(config.sync.mode),
            cwd: Some(self.remote.cwd()?),
            remove: self.remove,
            disable_initial: self.no_initial,
            notify: self.notify.clone(),
            ..WatchOptions::from_config(&config)
        };

        info!(
            src = %self.src.display(),
            dest = %self.dest,
            endpoint = %store.endpoint(),
            remove = self.remove,
            "Starting watch"
        );

        let handle = watch(
            store,
            queue.clone(),
            &src,
            self.dest.clone(),
            options,
            ignore,
        )
        .await
        .with_context(|| format!("Failed to watch {}", self.src.display()))?;

        if !handle.wait_for(SessionState::Ready).await {
            anyhow::bail!("Watch session ended before it was ready");
        }

        if globals.is_json() {
            formatter.print_json(&serde_json::json!({
                "watching": handle.root().display().to_string(),
                "dest": self.dest.as_str(),
                "session": handle.id().to_string(),
            }));
        } else {
            formatter.success(&format!(
                "Watching {} -> {}",
                handle.root().display(),
                self.dest
            ));
            formatter.info("Press Ctrl-C to stop");
        }

        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;

        formatter.info("Stopping, waiting for pending uploads...");
        handle.stop();
        handle.join().await;
        queue.idle().await;

        formatter.success("Watch stopped");
        Ok(())
    }
}
