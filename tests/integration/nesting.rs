//! A batch running as a sub-task of another batch.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use batchmode::{BatchQueue, BatchTask, Task, TaskRef, TaskStatus, WorkingSet};

use crate::fixtures::{task_refs, RecordingStep, ScriptedTask};

type InnerSlot = Arc<Mutex<Option<Arc<BatchTask>>>>;

/// Outer step that launches an inner batch over `inner_tasks` and hands it
/// back as its only sub-task.
fn nested_step(inner_tasks: Vec<TaskRef>, slot: InnerSlot) -> Arc<RecordingStep> {
    RecordingStep::new("nested", move |working_set, _| {
        let queue = BatchQueue::builder()
            .step(
                RecordingStep::with_tasks("inner", inner_tasks.clone()),
                json!(null),
            )
            .build();
        let inner = Arc::new(
            BatchTask::new(queue, working_set.clone())
                .with_poll_interval(Duration::from_millis(10)),
        );
        *slot.lock().unwrap() = Some(Arc::clone(&inner));
        Arc::clone(&inner).spawn();
        Ok(vec![inner as TaskRef])
    })
}

fn inner_of(slot: &InnerSlot) -> Arc<BatchTask> {
    slot.lock().unwrap().clone().expect("nested step ran")
}

/// Test: Nested completion
/// Given an outer batch whose step runs an inner batch
/// When the inner batch finishes
/// Then the outer batch is woken through the inner status watch and finishes
#[tokio::test]
async fn test_outer_batch_waits_for_inner() {
    let slot = InnerSlot::default();
    let work = ScriptedTask::new("inner work");
    let after = RecordingStep::empty("after");
    let queue = BatchQueue::builder()
        .step(nested_step(task_refs(&[work.clone()]), slot.clone()), json!(null))
        .step(after.clone(), json!(null))
        .build();
    let outer = Arc::new(
        BatchTask::new(queue, WorkingSet::default()).with_poll_interval(Duration::from_secs(3600)),
    );
    let handle = Arc::clone(&outer).spawn();

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(outer.processed_steps(), 0);
    assert_eq!(inner_of(&slot).status(), TaskStatus::Processing);

    work.finish(Vec::new());

    let status = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("inner completion must wake the outer batch")
        .unwrap()
        .unwrap();
    assert_eq!(status, TaskStatus::Finished);
    assert_eq!(inner_of(&slot).status(), TaskStatus::Finished);
    assert_eq!(outer.processed_steps(), 2);
    assert_eq!(after.calls(), 1);
}

/// Test: Cancel propagates inward
/// Given an outer batch waiting on an inner batch
/// When the outer batch is canceled
/// Then the inner batch and its sub-tasks are canceled too
#[tokio::test]
async fn test_cancel_propagates_to_inner_batch() {
    let slot = InnerSlot::default();
    let work = ScriptedTask::new("inner work");
    let queue = BatchQueue::builder()
        .step(nested_step(task_refs(&[work.clone()]), slot.clone()), json!(null))
        .build();
    let outer = Arc::new(BatchTask::new(queue, WorkingSet::default()));
    let handle = Arc::clone(&outer).spawn();

    tokio::time::sleep(Duration::from_millis(30)).await;
    let inner = inner_of(&slot);
    outer.cancel();

    let status = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(status, TaskStatus::Canceled);
    assert_eq!(inner.status(), TaskStatus::Canceled);

    let mut rx = Task::status_watch(inner.as_ref()).unwrap();
    let _ = rx.wait_for(|s| s.is_terminal()).await;
    tokio::time::timeout(Duration::from_secs(5), async {
        while work.cancel_calls() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("inner batch forwards the cancel to its sub-tasks");
    assert_eq!(work.status(), TaskStatus::Canceled);
}

/// Test: Inner failure
/// Given an inner batch whose sub-task fails with a message
/// When the outer batch observes it
/// Then the outer batch fails with the same message
#[tokio::test]
async fn test_inner_error_surfaces_in_outer_batch() {
    let slot = InnerSlot::default();
    let work = ScriptedTask::new("inner work");
    work.fail("calibration file missing");
    let queue = BatchQueue::builder()
        .step(nested_step(task_refs(&[work]), slot.clone()), json!(null))
        .build();
    let outer = BatchTask::new(queue, WorkingSet::default());

    let status = tokio::time::timeout(Duration::from_secs(5), outer.run())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(status, TaskStatus::Error);
    assert_eq!(
        outer.error_message().as_deref(),
        Some("calibration file missing")
    );
    assert_eq!(inner_of(&slot).status(), TaskStatus::Error);
}
