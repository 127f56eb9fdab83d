//! Debounced, append-only action log
//!
//! Every remote operation started by a watch session can be reported to
//! [`NotifyLogger::trigger`]. Entries are batched until no new entry has
//! arrived for the quiet period, then the batch waits for all of its
//! operations to settle and is appended to the log file in one write,
//! followed by a completion trailer:
//!
//! ```text
//! 2026-10-19T10:00:00.120+02:00 add: /proj/a.html
//! 2026-10-19T10:00:00.180+02:00 change: /proj/b.css
//! 2026-10-19T10:00:00.760+02:00 sync complete (2 actions)
//! ```
//!
//! A line is only ever written after its operation settled, successfully
//! or not.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::future::{join_all, BoxFuture, Shared};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Cloneable future that resolves once a queued remote operation settled
pub type Completion = Shared<BoxFuture<'static, ()>>;

/// Default quiet period before a batch is flushed
pub const DEFAULT_NOTIFY_DEBOUNCE: Duration = Duration::from_millis(500);

struct Entry {
    line: String,
    done: Completion,
}

/// Handle to the batching task; a disabled logger ignores every trigger
#[derive(Debug, Default)]
pub struct NotifyLogger {
    tx: Option<mpsc::UnboundedSender<Entry>>,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry").field("line", &self.line).finish()
    }
}

impl NotifyLogger {
    /// A logger that does nothing
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Starts a logger appending to `path`
    ///
    /// Must be called from within a tokio runtime. Dropping the logger
    /// still flushes the pending batch in the background; [`close`](Self::close)
    /// waits for that flush.
    pub fn new(path: impl Into<PathBuf>, debounce: Duration) -> Self {
        let path = path.into();
        let (tx, rx) = mpsc::unbounded_channel();
        debug!(path = %path.display(), debounce_ms = debounce.as_millis() as u64, "Starting notify log");
        let task = tokio::spawn(run_batcher(path, debounce, rx));
        Self {
            tx: Some(tx),
            task: Some(task),
        }
    }

    /// Starts a logger if `path` is set, otherwise returns a disabled one
    pub fn from_option(path: Option<PathBuf>, debounce: Duration) -> Self {
        match path {
            Some(path) => Self::new(path, debounce),
            None => Self::disabled(),
        }
    }

    /// Flushes the pending batch and waits until it is on disk
    ///
    /// The flush waits for every batched operation to settle first.
    pub async fn close(mut self) {
        self.tx = None;
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "Notify log task failed");
            }
        }
    }

    /// Adds `{timestamp} {action}: {path}` to the current batch
    ///
    /// `done` must resolve once the operation that produced the line has
    /// settled. Each call restarts the quiet period.
    pub fn trigger(&self, action: &str, path: &Path, done: Completion) {
        let Some(tx) = &self.tx else {
            return;
        };

        let line = format!("{} {}: {}", timestamp(), action, path.display());
        if tx.send(Entry { line, done }).is_err() {
            warn!(action, path = %path.display(), "Notify log task has stopped, dropping entry");
        }
    }
}

fn timestamp() -> String {
    chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, false)
}

async fn run_batcher(path: PathBuf, debounce: Duration, mut rx: mpsc::UnboundedReceiver<Entry>) {
    let mut batch: Vec<Entry> = Vec::new();

    loop {
        if batch.is_empty() {
            match rx.recv().await {
                Some(entry) => batch.push(entry),
                None => break,
            }
            continue;
        }

        tokio::select! {
            entry = rx.recv() => match entry {
                Some(entry) => batch.push(entry),
                None => {
                    flush(&path, std::mem::take(&mut batch)).await;
                    break;
                }
            },
            _ = tokio::time::sleep(debounce) => {
                flush(&path, std::mem::take(&mut batch)).await;
            }
        }
    }

    debug!(path = %path.display(), "Notify log stopped");
}

async fn flush(path: &Path, batch: Vec<Entry>) {
    let count = batch.len();
    let (lines, pending): (Vec<String>, Vec<Completion>) =
        batch.into_iter().map(|entry| (entry.line, entry.done)).unzip();

    join_all(pending).await;

    let mut text = String::new();
    for line in &lines {
        text.push_str(line);
        text.push('\n');
    }
    text.push_str(&format!("{} sync complete ({} actions)\n", timestamp(), count));

    if let Err(err) = append(path, text.as_bytes()).await {
        warn!(path = %path.display(), error = %err, "Failed to write notify log");
        return;
    }
    debug!(path = %path.display(), count, "Flushed notify log batch");
}

async fn append(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.flush().await
}
