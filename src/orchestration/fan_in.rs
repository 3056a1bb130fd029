//! Fan-in wait: block a step until all of its sub-tasks resolve.
//!
//! Each round re-checks batch cancellation first, then inspects every
//! sub-task once. Between rounds the wait wakes on whichever comes first:
//! batch cancellation, a status change pushed by any sub-task, or the poll
//! interval. The poll covers tasks that cannot push notifications, so
//! completion is always detected within one interval.

use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::blog_trace;
use crate::core::{TaskRef, TaskStatus};

/// How a step's sub-tasks resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FanInOutcome {
    /// Every sub-task reached `Finished`.
    Finished,
    /// A sub-task reported an error; carries its message.
    Error(String),
    /// The batch or one of the sub-tasks was canceled.
    Canceled,
}

/// Inspect each sub-task once, in the order the step returned them.
///
/// Returns `None` while any sub-task is still waiting or processing. The
/// first `Error` or `Canceled` encountered decides the outcome.
pub fn inspect(tasks: &[TaskRef]) -> Option<FanInOutcome> {
    let mut all_finished = true;

    for task in tasks {
        match task.status() {
            TaskStatus::Finished => {}
            TaskStatus::Error => {
                let message = task
                    .error_message()
                    .unwrap_or_else(|| format!("Task '{}' failed", task.description()));
                return Some(FanInOutcome::Error(message));
            }
            TaskStatus::Canceled => return Some(FanInOutcome::Canceled),
            TaskStatus::Waiting | TaskStatus::Processing => all_finished = false,
        }
    }

    all_finished.then_some(FanInOutcome::Finished)
}

/// Wait until `tasks` resolve or `cancel` fires.
///
/// On batch cancellation every sub-task is asked to cancel. On a sub-task
/// error the siblings are left running.
pub async fn wait_for_tasks(
    tasks: &[TaskRef],
    cancel: &CancellationToken,
    poll_interval: Duration,
) -> FanInOutcome {
    let mut watches: Vec<watch::Receiver<TaskStatus>> =
        tasks.iter().filter_map(|task| task.status_watch()).collect();
    let mut round: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            for task in tasks {
                task.cancel();
            }
            return FanInOutcome::Canceled;
        }

        // Mark current values seen before inspecting, so a change that lands
        // after inspection still wakes the wait below.
        for rx in watches.iter_mut() {
            rx.borrow_and_update();
        }

        if let Some(outcome) = inspect(tasks) {
            return outcome;
        }

        round += 1;
        blog_trace!(
            "fan-in round {}: {} task(s) outstanding, {} pushing",
            round,
            tasks.iter().filter(|t| !t.status().is_terminal()).count(),
            watches.len()
        );

        if let Some(closed) = wait_for_change(&mut watches, cancel, poll_interval).await {
            watches.swap_remove(closed);
        }
    }
}

/// Returns the index of a watch whose sender went away, if that is what
/// woke us. Such a task falls back to polling.
async fn wait_for_change(
    watches: &mut [watch::Receiver<TaskStatus>],
    cancel: &CancellationToken,
    poll_interval: Duration,
) -> Option<usize> {
    let mut changes: FuturesUnordered<_> = watches
        .iter_mut()
        .enumerate()
        .map(|(index, rx)| async move { (index, rx.changed().await.is_err()) })
        .collect();

    tokio::select! {
        _ = cancel.cancelled() => None,
        _ = tokio::time::sleep(poll_interval) => None,
        Some((index, closed)) = changes.next() => closed.then_some(index),
    }
}
