//! Bounded FIFO task queue
//!
//! [`TaskQueue`] runs at most `concurrency` futures at once. Submissions
//! beyond the limit wait and are started strictly in submission order;
//! they may complete in any order.
//!
//! ## Architecture
//!
//! ```text
//! add() ──→ mpsc (FIFO) ──→ scheduler task ──acquire permit──→ tokio::spawn(job)
//!   │                                                              │
//!   └──────────────── TaskHandle ◀──────── oneshot ◀───────────────┘
//! ```
//!
//! A single scheduler task pulls jobs in order and only spawns a job once
//! it holds a semaphore permit, so start order is exactly submission
//! order. One queue is meant to be shared (it is cheap to clone) by the
//! one-shot folder upload and the live watch session.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::{mpsc, oneshot, Notify, Semaphore};
use tracing::{debug, warn};

use crate::SyncError;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Counters shared between the queue handles, the scheduler and running jobs
#[derive(Default)]
struct Counters {
    /// Submitted but not yet started
    pending: AtomicUsize,
    /// Currently running
    active: AtomicUsize,
    /// Woken whenever the queue drains completely
    idle: Notify,
}

impl Counters {
    fn is_idle(&self) -> bool {
        self.pending.load(Ordering::Acquire) == 0 && self.active.load(Ordering::Acquire) == 0
    }

    fn notify_if_idle(&self) {
        if self.is_idle() {
            self.idle.notify_waiters();
        }
    }
}

/// Decrements the active count when a job finishes, even by panicking
struct ActiveGuard(Arc<Counters>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::AcqRel);
        self.0.notify_if_idle();
    }
}

/// A bounded-concurrency FIFO executor for remote operations
///
/// Cloning yields another handle to the same queue and the same slots.
/// Must be created from within a tokio runtime.
#[derive(Clone)]
pub struct TaskQueue {
    jobs: mpsc::UnboundedSender<Job>,
    counters: Arc<Counters>,
    concurrency: usize,
}

impl TaskQueue {
    /// Creates a queue running at most `concurrency` tasks at once (minimum 1)
    pub fn new(concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        let (jobs, rx) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());

        debug!(concurrency, "Creating task queue");
        tokio::spawn(run_scheduler(
            rx,
            Arc::new(Semaphore::new(concurrency)),
            Arc::clone(&counters),
        ));

        Self {
            jobs,
            counters,
            concurrency,
        }
    }

    /// Submits one task
    ///
    /// The returned handle resolves with the task's output. A failing
    /// (or panicking) task never affects its siblings.
    pub fn add<F, T>(&self, task: F) -> TaskHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let output = task.await;
            // The caller may have stopped caring about the result
            let _ = tx.send(output);
        });

        self.counters.pending.fetch_add(1, Ordering::AcqRel);
        if self.jobs.send(job).is_err() {
            self.counters.pending.fetch_sub(1, Ordering::AcqRel);
            warn!("Task queue scheduler has stopped, dropping task");
        }

        TaskHandle { rx }
    }

    /// Submits every task in iteration order
    pub fn add_all<I, F, T>(&self, tasks: I) -> Vec<TaskHandle<T>>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        tasks.into_iter().map(|task| self.add(task)).collect()
    }

    /// Maximum number of concurrently running tasks
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Number of tasks currently running
    pub fn active(&self) -> usize {
        self.counters.active.load(Ordering::Acquire)
    }

    /// Number of tasks submitted but not yet started
    pub fn pending(&self) -> usize {
        self.counters.pending.load(Ordering::Acquire)
    }

    /// Resolves once no task is pending or running
    pub async fn idle(&self) {
        loop {
            let notified = self.counters.idle.notified();
            if self.counters.is_idle() {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("concurrency", &self.concurrency)
            .field("active", &self.active())
            .field("pending", &self.pending())
            .finish()
    }
}

async fn run_scheduler(
    mut rx: mpsc::UnboundedReceiver<Job>,
    semaphore: Arc<Semaphore>,
    counters: Arc<Counters>,
) {
    while let Some(job) = rx.recv().await {
        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
            break;
        };

        counters.active.fetch_add(1, Ordering::AcqRel);
        counters.pending.fetch_sub(1, Ordering::AcqRel);
        let guard = ActiveGuard(Arc::clone(&counters));

        tokio::spawn(async move {
            let _guard = guard;
            let _permit = permit;
            job.await;
        });
    }

    debug!("Task queue scheduler stopped");
}

/// Completion handle for a task submitted to a [`TaskQueue`]
///
/// Resolves to the task's output, or [`SyncError::QueueClosed`] if the
/// task was dropped before finishing (the runtime shut down or the task
/// panicked).
#[must_use = "a TaskHandle does nothing unless awaited; drop it to detach"]
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, SyncError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.map_err(|_| SyncError::QueueClosed))
    }
}
