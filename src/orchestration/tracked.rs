//! Ready-made task implementation for step authors.
//!
//! A `TrackedTask` is the handle a step returns to the orchestrator while
//! the actual work runs elsewhere (usually a spawned tokio task). The worker
//! reports through `start`/`set_progress`/`finish`/`fail`; the orchestrator
//! observes through the [`Task`] trait and may request cancellation.

use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::core::task::advance;
use crate::core::{CreatedObject, Task, TaskStatus};
use crate::util::{lock, AtomicFraction};
use crate::{blog_debug, blog_trace};

pub struct TrackedTask {
    description: String,
    status_tx: watch::Sender<TaskStatus>,
    progress: AtomicFraction,
    error_message: Mutex<Option<String>>,
    created_objects: Mutex<Vec<CreatedObject>>,
    cancel: CancellationToken,
}

impl TrackedTask {
    pub fn new(description: &str) -> Arc<Self> {
        let (status_tx, _) = watch::channel(TaskStatus::Waiting);
        Arc::new(Self {
            description: description.to_string(),
            status_tx,
            progress: AtomicFraction::default(),
            error_message: Mutex::new(None),
            created_objects: Mutex::new(Vec::new()),
            cancel: CancellationToken::new(),
        })
    }

    /// Run `work` on the tokio runtime and report its outcome.
    ///
    /// The future is dropped as soon as cancellation is requested. `Ok`
    /// objects finish the task, `Err` fails it with the given message.
    pub fn spawn<F, Fut>(description: &str, work: F) -> Arc<Self>
    where
        F: FnOnce(Arc<TrackedTask>) -> Fut,
        Fut: Future<Output = std::result::Result<Vec<CreatedObject>, String>> + Send + 'static,
    {
        let task = Self::new(description);
        let fut = work(Arc::clone(&task));
        let handle = Arc::clone(&task);

        tokio::spawn(async move {
            handle.start();
            let cancel = handle.cancellation_token();
            tokio::select! {
                _ = cancel.cancelled() => {
                    blog_debug!("TrackedTask '{}' dropped its work after cancel", handle.description);
                }
                outcome = fut => match outcome {
                    Ok(objects) => handle.finish(objects),
                    Err(message) => handle.fail(&message),
                },
            }
        });

        task
    }

    /// Like [`TrackedTask::spawn`] for blocking, CPU-bound work.
    ///
    /// Blocking work cannot be interrupted; a cancel marks the task
    /// `Canceled` immediately and the eventual result is discarded.
    pub fn spawn_blocking<F>(description: &str, work: F) -> Arc<Self>
    where
        F: FnOnce(&TrackedTask) -> std::result::Result<Vec<CreatedObject>, String>
            + Send
            + 'static,
    {
        let task = Self::new(description);
        let handle = Arc::clone(&task);

        tokio::task::spawn_blocking(move || {
            handle.start();
            match work(&handle) {
                Ok(objects) => handle.finish(objects),
                Err(message) => handle.fail(&message),
            }
        });

        task
    }

    pub fn start(&self) {
        if advance(&self.status_tx, TaskStatus::Processing) {
            blog_trace!("TrackedTask '{}' processing", self.description);
        }
    }

    pub fn set_progress(&self, fraction: f64) {
        self.progress.store(fraction);
    }

    /// Complete the task with its output. Ignored once terminal.
    pub fn finish(&self, objects: Vec<CreatedObject>) {
        self.start();
        // Held across the transition so a second finish cannot overwrite
        // the winner's output.
        let mut slot = lock(&self.created_objects);
        if self.status().is_terminal() {
            return;
        }
        *slot = objects;
        if advance(&self.status_tx, TaskStatus::Finished) {
            self.progress.store(1.0);
        }
    }

    /// Fail the task. Ignored once terminal.
    pub fn fail(&self, message: &str) {
        self.start();
        let mut slot = lock(&self.error_message);
        if self.status().is_terminal() {
            return;
        }
        *slot = Some(message.to_string());
        if advance(&self.status_tx, TaskStatus::Error) {
            blog_debug!("TrackedTask '{}' failed: {}", self.description, message);
        }
    }

    /// Token the worker can watch to honor cancellation.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Task for TrackedTask {
    fn status(&self) -> TaskStatus {
        *self.status_tx.borrow()
    }

    fn progress(&self) -> f64 {
        self.progress.load()
    }

    fn error_message(&self) -> Option<String> {
        if self.status() == TaskStatus::Error {
            lock(&self.error_message).clone()
        } else {
            None
        }
    }

    fn created_objects(&self) -> Vec<CreatedObject> {
        if self.status() == TaskStatus::Finished {
            lock(&self.created_objects).clone()
        } else {
            Vec::new()
        }
    }

    fn cancel(&self) {
        self.cancel.cancel();
        advance(&self.status_tx, TaskStatus::Canceled);
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn status_watch(&self) -> Option<watch::Receiver<TaskStatus>> {
        Some(self.status_tx.subscribe())
    }
}

impl std::fmt::Debug for TrackedTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedTask")
            .field("description", &self.description)
            .field("status", &self.status())
            .field("progress", &self.progress())
            .finish()
    }
}
