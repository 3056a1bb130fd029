//! Batch queue: the fixed, ordered list of steps a batch runs.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::{TaskRef, WorkingSet};
use crate::error::Result;

/// Opaque configuration handed to a step. The batch imposes no schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigSnapshot(pub serde_json::Value);

impl ConfigSnapshot {
    pub fn empty() -> Self {
        Self(serde_json::Value::Null)
    }

    pub fn value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Look up a top-level field, if the snapshot is an object.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }
}

impl From<serde_json::Value> for ConfigSnapshot {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// One stage of a processing pipeline.
///
/// `run` is called once per batch run with the current working set. It must
/// return promptly: long work belongs in the returned tasks. Returning no
/// tasks means the step already did everything it needed to.
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    fn run(&self, working_set: &WorkingSet, config: &ConfigSnapshot) -> Result<Vec<TaskRef>>;
}

pub type StepRef = Arc<dyn Step>;

/// A step paired with the configuration it runs with.
#[derive(Clone)]
pub struct BatchQueueEntry {
    step: StepRef,
    config: ConfigSnapshot,
}

impl BatchQueueEntry {
    pub fn new(step: StepRef, config: ConfigSnapshot) -> Self {
        Self { step, config }
    }

    pub fn step(&self) -> &StepRef {
        &self.step
    }

    pub fn config(&self) -> &ConfigSnapshot {
        &self.config
    }
}

impl std::fmt::Debug for BatchQueueEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchQueueEntry")
            .field("step", &self.step.name())
            .field("config", &self.config)
            .finish()
    }
}

/// Ordered steps of a batch. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct BatchQueue {
    entries: Vec<BatchQueueEntry>,
}

impl BatchQueue {
    pub fn builder() -> BatchQueueBuilder {
        BatchQueueBuilder::default()
    }

    pub fn from_entries(entries: Vec<BatchQueueEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&BatchQueueEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BatchQueueEntry> {
        self.entries.iter()
    }

    /// Step names in execution order.
    pub fn step_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.step.name().to_string())
            .collect()
    }
}

#[derive(Default)]
pub struct BatchQueueBuilder {
    entries: Vec<BatchQueueEntry>,
}

impl BatchQueueBuilder {
    pub fn step(mut self, step: StepRef, config: impl Into<ConfigSnapshot>) -> Self {
        self.entries.push(BatchQueueEntry::new(step, config.into()));
        self
    }

    pub fn build(self) -> BatchQueue {
        BatchQueue {
            entries: self.entries,
        }
    }
}
