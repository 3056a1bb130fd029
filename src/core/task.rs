//! The task contract consumed by the orchestrator.
//!
//! A task is an independently progressing unit of work. The orchestrator
//! only observes it: status, progress, error, output, and a cancellation
//! request. How and where the work runs is up to the implementation.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

use super::item::CreatedObject;
use crate::blog_trace;
use crate::error::{Error, Result};

/// Lifecycle status shared by sub-tasks and the batch itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created but not yet started.
    Waiting,
    /// Work is in progress.
    Processing,
    /// Completed successfully.
    Finished,
    /// Failed; an error message is available.
    Error,
    /// Canceled before completion.
    Canceled,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Waiting
    }
}

impl TaskStatus {
    /// Finished, Error and Canceled never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Finished | TaskStatus::Error | TaskStatus::Canceled
        )
    }

    /// Check whether moving from this status to `target` is a forward step.
    ///
    /// - Waiting -> Processing | Canceled
    /// - Processing -> Finished | Error | Canceled
    pub fn can_transition(&self, target: TaskStatus) -> bool {
        matches!(
            (self, target),
            (TaskStatus::Waiting, TaskStatus::Processing)
                | (TaskStatus::Waiting, TaskStatus::Canceled)
                | (TaskStatus::Processing, TaskStatus::Finished)
                | (TaskStatus::Processing, TaskStatus::Error)
                | (TaskStatus::Processing, TaskStatus::Canceled)
        )
    }

    /// Checked form of [`can_transition`](Self::can_transition).
    pub fn transition(self, target: TaskStatus) -> Result<TaskStatus> {
        if self.can_transition(target) {
            Ok(target)
        } else {
            Err(Error::InvalidStatusTransition {
                from: self,
                to: target,
            })
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Waiting => write!(f, "waiting"),
            TaskStatus::Processing => write!(f, "processing"),
            TaskStatus::Finished => write!(f, "finished"),
            TaskStatus::Error => write!(f, "error"),
            TaskStatus::Canceled => write!(f, "canceled"),
        }
    }
}

/// A unit of asynchronous work observed by the orchestrator.
///
/// All accessors may be called from any thread at any time. `cancel` is an
/// idempotent request; the task is trusted to honor it eventually.
pub trait Task: Send + Sync {
    fn status(&self) -> TaskStatus;

    /// Fraction of work done, in `[0, 1]`.
    fn progress(&self) -> f64;

    /// Present iff `status()` is `Error`.
    fn error_message(&self) -> Option<String>;

    /// Objects produced by the task. Only meaningful once `Finished`.
    fn created_objects(&self) -> Vec<CreatedObject>;

    fn cancel(&self);

    /// Human-readable summary, for display only.
    fn description(&self) -> String;

    /// Receiver notified on every status change.
    ///
    /// Tasks that cannot push notifications return `None` and are picked up
    /// by the fan-in wait's fallback poll instead.
    fn status_watch(&self) -> Option<watch::Receiver<TaskStatus>> {
        None
    }
}

/// Shared handle to a running task.
pub type TaskRef = Arc<dyn Task>;

/// Apply a forward transition on a status channel.
///
/// Returns `true` when the status changed. Backward or sideways moves
/// (including anything out of a terminal status) are ignored.
pub(crate) fn advance(tx: &watch::Sender<TaskStatus>, target: TaskStatus) -> bool {
    tx.send_if_modified(|current| match current.transition(target) {
        Ok(next) => {
            *current = next;
            true
        }
        Err(e) => {
            blog_trace!("{}", e);
            false
        }
    })
}
