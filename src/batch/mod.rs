//! Batch definitions: steps and the queue that orders them.

mod queue;

pub use queue::{BatchQueue, BatchQueueBuilder, BatchQueueEntry, ConfigSnapshot, Step, StepRef};
