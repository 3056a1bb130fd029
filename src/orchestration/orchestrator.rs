//! Batch orchestrator.
//!
//! `BatchTask` drives a [`BatchQueue`] one step at a time. Each step is
//! dispatched against the current working set, its sub-tasks are waited on
//! (see [`fan_in`](super::fan_in)), and whatever they created becomes the
//! working set for the next step. The batch is itself a [`Task`], so it can
//! be observed, canceled, or nested inside another batch.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::events::BatchEvent;
use super::fan_in::{wait_for_tasks, FanInOutcome};
use crate::batch::{BatchQueue, BatchQueueEntry};
use crate::config::{BatchConfig, DEFAULT_POLL_INTERVAL_MS};
use crate::core::task::advance;
use crate::core::{CreatedObject, Task, TaskStatus, WorkingSet, WorkingSetDelta};
use crate::error::{Error, Result};
use crate::util::{lock, read, write};
use crate::{blog, blog_debug, blog_error, blog_warn};

/// How a single queue entry resolved.
enum StepOutcome {
    Completed,
    Stopped,
}

/// Runs a batch queue against a working set.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use batchmode::{BatchQueue, BatchTask, TaskStatus, WorkingSet};
///
/// let queue = BatchQueue::builder()
///     .step(Arc::new(ImportStep), serde_json::json!({"dir": "/data"}))
///     .step(Arc::new(DetectStep), serde_json::json!({"noise": 3.0}))
///     .build();
///
/// let batch = Arc::new(BatchTask::new(queue, WorkingSet::default()));
/// let status = batch.run().await?;
/// assert_eq!(status, TaskStatus::Finished);
/// ```
pub struct BatchTask {
    queue: BatchQueue,
    status_tx: watch::Sender<TaskStatus>,
    /// Written before `Error` is published; read only while status is `Error`.
    error_message: Mutex<Option<String>>,
    processed_steps: AtomicUsize,
    working_set: RwLock<Arc<WorkingSet>>,
    cancel: CancellationToken,
    started: AtomicBool,
    poll_interval: Duration,
    event_tx: Option<mpsc::Sender<BatchEvent>>,
}

impl BatchTask {
    pub fn new(queue: BatchQueue, working_set: WorkingSet) -> Self {
        let (status_tx, _) = watch::channel(TaskStatus::Waiting);
        Self {
            queue,
            status_tx,
            error_message: Mutex::new(None),
            processed_steps: AtomicUsize::new(0),
            working_set: RwLock::new(Arc::new(working_set)),
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            event_tx: None,
        }
    }

    pub fn with_config(mut self, config: &BatchConfig) -> Self {
        self.poll_interval = config.poll_interval();
        self
    }

    /// Upper bound on the fan-in sleep for tasks without push notification.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Emit lifecycle events on `tx`. Events are dropped when the channel
    /// is full or closed; the batch never waits on a slow listener.
    pub fn with_events(mut self, tx: mpsc::Sender<BatchEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Run the batch on the tokio runtime.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<Result<TaskStatus>> {
        tokio::spawn(async move { self.run().await })
    }

    /// Execute every queue entry in order.
    ///
    /// Returns the terminal status. A batch canceled before `run` returns
    /// `Canceled` without executing any step. Running a batch twice is an
    /// error.
    pub async fn run(&self) -> Result<TaskStatus> {
        if self.started.swap(true, Ordering::SeqCst) {
            let status = self.status();
            blog_error!("BatchTask::run called again (status: {})", status);
            return Err(Error::AlreadyStarted { status });
        }

        if !advance(&self.status_tx, TaskStatus::Processing) {
            blog_warn!("Batch canceled before it started");
            self.emit(BatchEvent::BatchCanceled);
            return Ok(self.status());
        }

        let total = self.total_steps();
        blog!("Starting a batch of {} steps", total);
        self.emit(BatchEvent::BatchStarted { total_steps: total });

        for (index, entry) in self.queue.iter().enumerate() {
            // cancel() publishes Canceled before firing the token.
            if self.status().is_terminal() {
                break;
            }
            if let StepOutcome::Stopped = self.process_step(index, entry).await {
                break;
            }
        }

        if advance(&self.status_tx, TaskStatus::Finished) {
            blog!("Finished a batch of {} steps", total);
            self.emit(BatchEvent::BatchFinished);
        } else if self.status() == TaskStatus::Canceled {
            blog_warn!(
                "Batch canceled after {} of {} steps",
                self.processed_steps(),
                total
            );
            self.emit(BatchEvent::BatchCanceled);
        }

        Ok(self.status())
    }

    async fn process_step(&self, index: usize, entry: &BatchQueueEntry) -> StepOutcome {
        let step = entry.step();
        let input = self.working_set();

        let tasks = match step.run(&input, entry.config()) {
            Ok(tasks) => tasks,
            Err(e) => {
                let launch = Error::StepLaunch {
                    step: step.name().to_string(),
                    message: e.to_string(),
                };
                self.fail(launch.to_string());
                return StepOutcome::Stopped;
            }
        };

        blog_debug!(
            "Step {}/{} '{}' dispatched {} task(s)",
            index + 1,
            self.total_steps(),
            step.name(),
            tasks.len()
        );
        self.emit(BatchEvent::StepStarted {
            index,
            step: step.name().to_string(),
            task_count: tasks.len(),
        });

        if !tasks.is_empty() {
            match wait_for_tasks(&tasks, &self.cancel, self.poll_interval).await {
                FanInOutcome::Finished => {}
                FanInOutcome::Error(message) => {
                    self.fail(message);
                    return StepOutcome::Stopped;
                }
                FanInOutcome::Canceled => {
                    self.mark_canceled();
                    return StepOutcome::Stopped;
                }
            }
        }

        let created: Vec<CreatedObject> = tasks
            .iter()
            .flat_map(|task| task.created_objects())
            .collect();
        let delta = WorkingSetDelta::collect(&created);
        let replaced_primary = delta.replaces_primary();
        let replaced_derived = delta.replaces_derived();

        self.processed_steps.fetch_add(1, Ordering::AcqRel);
        if !delta.is_empty() {
            let next = input.apply(delta);
            blog_debug!(
                "Working set now {} primary / {} derived item(s)",
                next.primary_items.len(),
                next.derived_items.len()
            );
            *write(&self.working_set) = Arc::new(next);
        }

        self.emit(BatchEvent::StepCompleted {
            index,
            replaced_primary,
            replaced_derived,
        });
        StepOutcome::Completed
    }

    fn fail(&self, message: String) {
        *lock(&self.error_message) = Some(message.clone());
        if advance(&self.status_tx, TaskStatus::Error) {
            blog_warn!("Batch failed: {}", message);
            self.emit(BatchEvent::BatchFailed { error: message });
        } else {
            *lock(&self.error_message) = None;
        }
    }

    fn mark_canceled(&self) {
        advance(&self.status_tx, TaskStatus::Canceled);
        self.cancel.cancel();
    }

    fn emit(&self, event: BatchEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.try_send(event);
        }
    }

    pub fn status(&self) -> TaskStatus {
        *self.status_tx.borrow()
    }

    pub fn total_steps(&self) -> usize {
        self.queue.len()
    }

    pub fn processed_steps(&self) -> usize {
        self.processed_steps.load(Ordering::Acquire)
    }

    /// `processed_steps / total_steps`, or 0 for an empty queue.
    pub fn finished_percentage(&self) -> f64 {
        let total = self.total_steps();
        if total == 0 {
            return 0.0;
        }
        self.processed_steps() as f64 / total as f64
    }

    pub fn error_message(&self) -> Option<String> {
        if self.status() == TaskStatus::Error {
            lock(&self.error_message).clone()
        } else {
            None
        }
    }

    /// Snapshot of the current working set.
    pub fn working_set(&self) -> Arc<WorkingSet> {
        Arc::clone(&read(&self.working_set))
    }

    pub fn queue(&self) -> &BatchQueue {
        &self.queue
    }

    /// Request cancellation. Safe from any thread, any number of times.
    ///
    /// Has no effect on the status of a batch that already ended.
    pub fn cancel(&self) {
        if advance(&self.status_tx, TaskStatus::Canceled) {
            blog_debug!("Batch cancel requested");
        }
        self.cancel.cancel();
    }
}

impl Task for BatchTask {
    fn status(&self) -> TaskStatus {
        BatchTask::status(self)
    }

    fn progress(&self) -> f64 {
        self.finished_percentage()
    }

    fn error_message(&self) -> Option<String> {
        BatchTask::error_message(self)
    }

    /// A batch reports nothing upward.
    fn created_objects(&self) -> Vec<CreatedObject> {
        Vec::new()
    }

    fn cancel(&self) {
        BatchTask::cancel(self)
    }

    fn description(&self) -> String {
        format!("Batch of {} steps", self.total_steps())
    }

    fn status_watch(&self) -> Option<watch::Receiver<TaskStatus>> {
        Some(self.status_tx.subscribe())
    }
}

impl std::fmt::Debug for BatchTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchTask")
            .field("status", &self.status())
            .field("total_steps", &self.total_steps())
            .field("processed_steps", &self.processed_steps())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}
