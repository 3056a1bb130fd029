//! Core domain models for batch orchestration.
//!
//! This module contains the task contract, the data items a batch moves
//! around, and the working set they are collected in.

pub mod item;
pub mod task;
pub mod working_set;

pub use item::{CreatedObject, DerivedItem, ItemId, PrimaryItem};
pub use task::{Task, TaskRef, TaskStatus};
pub use working_set::{WorkingSet, WorkingSetDelta};
