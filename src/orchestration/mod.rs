//! Orchestration layer: running a batch queue to completion.
//!
//! The `BatchTask` dispatches steps in order and waits on the sub-tasks
//! each one spawns; `TrackedTask` is the stock sub-task implementation
//! steps can return.

mod events;
mod fan_in;
mod orchestrator;
mod tracked;

pub use events::{event_channel, BatchEvent};
pub use fan_in::{inspect, wait_for_tasks, FanInOutcome};
pub use orchestrator::BatchTask;
pub use tracked::TrackedTask;
