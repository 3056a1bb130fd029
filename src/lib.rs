//! Batch orchestration for multi-step data processing pipelines.
//!
//! A batch is an ordered queue of steps. Each step may launch any number of
//! concurrently running tasks; the batch waits for all of them, stops on
//! the first failure or on cancellation, and feeds whatever they produced
//! into the next step.

pub mod batch;
pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod orchestration;
mod util;

pub use batch::{BatchQueue, BatchQueueEntry, ConfigSnapshot, Step, StepRef};
pub use config::BatchConfig;
pub use self::core::{
    CreatedObject, DerivedItem, ItemId, PrimaryItem, Task, TaskRef, TaskStatus, WorkingSet,
    WorkingSetDelta,
};
pub use error::{Error, Result};
pub use orchestration::{BatchEvent, BatchTask, TrackedTask};
