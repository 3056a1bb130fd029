//! Lifecycle events emitted by a running batch.

use tokio::sync::mpsc;

use crate::config::BatchConfig;

/// Events emitted by the orchestrator for step and batch state changes.
///
/// These let a caller follow a batch without polling its accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    /// The batch moved to processing.
    BatchStarted {
        total_steps: usize,
    },
    /// A step was dispatched.
    StepStarted {
        /// Zero-based position in the queue.
        index: usize,
        /// Name of the step.
        step: String,
        /// How many sub-tasks the step returned.
        task_count: usize,
    },
    /// A step resolved and its output was merged.
    StepCompleted {
        index: usize,
        /// Whether the step's output replaced the primary items.
        replaced_primary: bool,
        /// Whether the step's output replaced the derived items.
        replaced_derived: bool,
    },
    BatchFinished,
    BatchFailed {
        error: String,
    },
    BatchCanceled,
}

impl BatchEvent {
    /// Check if this event ends the batch.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchEvent::BatchFinished | BatchEvent::BatchFailed { .. } | BatchEvent::BatchCanceled
        )
    }
}

/// Create an event channel sized from the config.
pub fn event_channel(config: &BatchConfig) -> (mpsc::Sender<BatchEvent>, mpsc::Receiver<BatchEvent>) {
    mpsc::channel(config.event_buffer)
}
