//! Upload command - One-shot folder upload

use std::path::PathBuf;

use anyhow::{Context, Result};
use sitesync_core::domain::newtypes::RemotePath;
use sitesync_sync::{upload_folder, TaskQueue, UploadOptions, UploadReport};
use tracing::info;

use super::{parse_remote, source_root, GlobalOptions, RemoteArgs};
use crate::output::Output;

/// Arguments for the upload subcommand
#[derive(Debug, clap::Args)]
pub struct UploadCommand {
    /// Local folder to upload
    pub src: PathBuf,

    /// Remote destination folder
    #[arg(value_parser = parse_remote)]
    pub dest: RemotePath,

    #[command(flatten)]
    pub remote: RemoteArgs,
}

impl UploadCommand {
    /// Execute the upload command
    ///
    /// Exits non-zero when a fatal error aborted the run or any file
    /// failed its retry.
    pub async fn execute(&self, globals: &GlobalOptions) -> Result<()> {
        let formatter = globals.formatter();
        let config = globals.load_config()?;

        let src = source_root(&self.src)?;
        let store = self.remote.store(&config)?;
        let ignore = self.remote.ignore_filter(&config)?;
        let queue = TaskQueue::new(config.sync.concurrency);

        let options = UploadOptions {
            mode: self.remote.mode_or(config.sync.mode),
            ..UploadOptions::from_config(&config)
        };

        info!(
            src = %self.src.display(),
            dest = %self.dest,
            endpoint = %store.endpoint(),
            mode = %options.mode,
            "Uploading folder"
        );

        let report = upload_folder(
            std::sync::Arc::new(store),
            queue,
            &src,
            self.dest.clone(),
            options,
            ignore,
        )
        .await
        .with_context(|| format!("Upload of {} aborted", self.src.display()))?;

        if globals.is_json() {
            let json =
                serde_json::to_value(&report).context("Failed to serialize upload report")?;
            formatter.print_json(&json);
        } else {
            print_report(&formatter, &report);
        }

        if !report.is_complete() {
            anyhow::bail!("{} file(s) failed to upload", report.failures.len());
        }
        Ok(())
    }
}

fn print_report(formatter: &Output, report: &UploadReport) {
    if report.is_complete() {
        formatter.success(&format!("Uploaded {} file(s)", report.uploaded));
    } else {
        formatter.warn(&format!(
            "Uploaded {} file(s), {} failed",
            report.uploaded,
            report.failures.len()
        ));
    }
    if report.skipped > 0 {
        formatter.info(&format!("Skipped {} file(s)", report.skipped));
    }
    for failure in &report.failures {
        formatter.info(&format!(
            "  {} -> {}: {}",
            failure.file.display(),
            failure.remote,
            failure.error
        ));
    }
}
