//! Fail-fast behavior.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use batchmode::{
    BatchQueue, BatchTask, DerivedItem, Error, PrimaryItem, Task, TaskStatus, TrackedTask,
    WorkingSet,
};

use crate::fixtures::{task_refs, RecordingStep, ScriptedTask};

/// Test: Sub-task error
/// Given a three-step batch whose second step has a sub-task failing with "X"
/// When the batch runs
/// Then it ends in Error with message "X", processed == 1, and the third
/// step is never dispatched
#[tokio::test(start_paused = true)]
async fn test_subtask_error_stops_batch() {
    let ok = ScriptedTask::finished("ok", Vec::new());
    let failing = ScriptedTask::new("failing");
    let sibling = ScriptedTask::new("sibling");
    let third = RecordingStep::empty("third");

    let queue = BatchQueue::builder()
        .step(RecordingStep::with_tasks("first", task_refs(&[ok])), json!(null))
        .step(
            RecordingStep::with_tasks("second", task_refs(&[sibling.clone(), failing.clone()])),
            json!(null),
        )
        .step(third.clone(), json!(null))
        .build();
    let batch = Arc::new(BatchTask::new(queue, WorkingSet::default()));
    let handle = Arc::clone(&batch).spawn();

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(batch.error_message().is_none());
    failing.fail("X");

    assert_eq!(handle.await.unwrap().unwrap(), TaskStatus::Error);
    assert_eq!(batch.error_message().as_deref(), Some("X"));
    assert_eq!(Task::error_message(batch.as_ref()).as_deref(), Some("X"));
    assert_eq!(batch.processed_steps(), 1);
    assert_eq!(third.calls(), 0);

    // Error path does not cancel the remaining sibling.
    assert_eq!(sibling.cancel_calls(), 0);
    assert_eq!(sibling.status(), TaskStatus::Processing);
}

/// Test: No rollback
/// Given a step that replaced the working set before a later failure
/// When the batch fails
/// Then the earlier merge stays in effect
#[tokio::test]
async fn test_failure_keeps_earlier_merges() {
    let imported = vec![PrimaryItem::new("a.raw"), PrimaryItem::new("b.raw")];
    let import = ScriptedTask::finished(
        "import",
        imported.iter().cloned().map(Into::into).collect(),
    );
    let detect = ScriptedTask::new("detect");
    detect.fail("peak detection diverged");

    let queue = BatchQueue::builder()
        .step(RecordingStep::with_tasks("import", task_refs(&[import])), json!(null))
        .step(RecordingStep::with_tasks("detect", task_refs(&[detect])), json!(null))
        .build();
    let batch = BatchTask::new(
        queue,
        WorkingSet::new(Vec::new(), vec![DerivedItem::new("prior")]),
    );

    assert_eq!(batch.run().await.unwrap(), TaskStatus::Error);
    assert_eq!(batch.working_set().primary_items, imported);
    assert_eq!(batch.working_set().derived_items.len(), 1);
    assert_eq!(batch.finished_percentage(), 0.5);
}

/// Test: Launch failure
/// Given a step whose dispatch itself fails
/// When the batch runs
/// Then it ends in Error naming the step
#[tokio::test]
async fn test_step_launch_failure() {
    let after = RecordingStep::empty("after");
    let queue = BatchQueue::builder()
        .step(
            RecordingStep::new("export", |_, _| {
                Err(Error::Validation("no output directory".to_string()))
            }),
            json!(null),
        )
        .step(after.clone(), json!(null))
        .build();
    let batch = BatchTask::new(queue, WorkingSet::default());

    assert_eq!(batch.run().await.unwrap(), TaskStatus::Error);
    let message = batch.error_message().unwrap();
    assert!(message.contains("export"), "message was: {}", message);
    assert!(message.contains("no output directory"));
    assert_eq!(batch.processed_steps(), 0);
    assert_eq!(after.calls(), 0);
}

/// Test: Error after cancel
/// Given a batch already canceled while waiting
/// When a sub-task then reports an error
/// Then the batch stays Canceled without an error message
#[tokio::test(start_paused = true)]
async fn test_cancel_wins_over_later_error() {
    let task = ScriptedTask::new("slow");
    let queue = BatchQueue::builder()
        .step(RecordingStep::with_tasks("slow", task_refs(&[task.clone()])), json!(null))
        .build();
    let batch = Arc::new(BatchTask::new(queue, WorkingSet::default()));
    let handle = Arc::clone(&batch).spawn();

    tokio::time::sleep(Duration::from_millis(100)).await;
    batch.cancel();
    task.fail("too late");

    assert_eq!(handle.await.unwrap().unwrap(), TaskStatus::Canceled);
    assert!(batch.error_message().is_none());
}

/// Test: Repeated failure reports
/// Given a tracked sub-task that reports two failures
/// When the batch observes it
/// Then the batch carries the first message, not a generic one
#[tokio::test]
async fn test_first_failure_message_reaches_batch() {
    let task = TrackedTask::new("detect");
    task.fail("baseline drift");
    task.fail("retry exhausted");
    let queue = BatchQueue::builder()
        .step(RecordingStep::with_tasks("detect", task_refs(&[task])), json!(null))
        .build();
    let batch = BatchTask::new(queue, WorkingSet::default());

    assert_eq!(batch.run().await.unwrap(), TaskStatus::Error);
    assert_eq!(batch.error_message().as_deref(), Some("baseline drift"));
}
