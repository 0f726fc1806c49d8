//! Bounded-concurrency task runner.
//!
//! Runs a batch of independent futures with at most `k` in flight. Workers
//! are cooperative futures polled on the caller's task (nothing is
//! spawned), each claiming the next index from a shared cursor until the
//! batch is exhausted. Output order always matches input order.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::join_all;

/// Default number of tasks in flight.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Cooperative cancellation flag shared between a caller and a run.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Options for [`run_bounded`].
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Maximum tasks in flight. Zero is treated as one.
    pub concurrency: usize,
    /// Checked before each task is claimed; tasks not yet started when it
    /// fires are reported as [`TaskOutcome::Cancelled`].
    pub cancel: CancellationToken,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl RunnerOptions {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Per-task result of [`run_bounded`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome<T> {
    Completed(T),
    Cancelled,
}

impl<T> TaskOutcome<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskOutcome::Cancelled)
    }

    pub fn completed(self) -> Option<T> {
        match self {
            TaskOutcome::Completed(value) => Some(value),
            TaskOutcome::Cancelled => None,
        }
    }
}

/// Run `tasks` with at most `options.concurrency` in flight.
///
/// Starts `min(k, n)` workers. The returned vector has one entry per task,
/// at the task's original index.
pub async fn run_bounded<F, T>(tasks: Vec<F>, options: RunnerOptions) -> Vec<TaskOutcome<T>>
where
    F: Future<Output = T>,
{
    let total = tasks.len();
    let workers = options.concurrency.max(1).min(total);

    let slots: Vec<Mutex<Option<F>>> = tasks.into_iter().map(|t| Mutex::new(Some(t))).collect();
    let cursor = AtomicUsize::new(0);

    let slots = &slots;
    let cursor = &cursor;
    let cancel = &options.cancel;

    let finished = join_all((0..workers).map(move |_| async move {
        let mut done = Vec::new();
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let index = cursor.fetch_add(1, Ordering::SeqCst);
            if index >= total {
                break;
            }
            let task = slots[index]
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(task) = task {
                done.push((index, task.await));
            }
        }
        done
    }))
    .await;

    let mut outcomes: Vec<TaskOutcome<T>> = (0..total).map(|_| TaskOutcome::Cancelled).collect();
    for (index, value) in finished.into_iter().flatten() {
        outcomes[index] = TaskOutcome::Completed(value);
    }
    outcomes
}
