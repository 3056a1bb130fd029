//! The data a batch is transforming.
//!
//! A working set is an immutable value. Merging the output of a step yields
//! a new set; the orchestrator swaps it in wholesale between steps.

use serde::{Deserialize, Serialize};

use super::item::{CreatedObject, DerivedItem, PrimaryItem};

/// Two order-preserving collections of typed items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkingSet {
    pub primary_items: Vec<PrimaryItem>,
    pub derived_items: Vec<DerivedItem>,
}

/// What a merge replaced. Empty collections mean "left untouched".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkingSetDelta {
    pub primary_items: Vec<PrimaryItem>,
    pub derived_items: Vec<DerivedItem>,
}

impl WorkingSetDelta {
    /// Sort created objects by kind, keeping the order they were reported in.
    pub fn collect<'a, I>(objects: I) -> Self
    where
        I: IntoIterator<Item = &'a CreatedObject>,
    {
        let mut delta = Self::default();
        for object in objects {
            match object {
                CreatedObject::Primary(item) => delta.primary_items.push(item.clone()),
                CreatedObject::Derived(item) => delta.derived_items.push(item.clone()),
                CreatedObject::Other(_) => {}
            }
        }
        delta
    }

    pub fn replaces_primary(&self) -> bool {
        !self.primary_items.is_empty()
    }

    pub fn replaces_derived(&self) -> bool {
        !self.derived_items.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        !self.replaces_primary() && !self.replaces_derived()
    }
}

impl WorkingSet {
    pub fn new(primary_items: Vec<PrimaryItem>, derived_items: Vec<DerivedItem>) -> Self {
        Self {
            primary_items,
            derived_items,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.primary_items.is_empty() && self.derived_items.is_empty()
    }

    /// Apply a delta. Each non-empty collection in the delta replaces the
    /// matching collection; empty ones leave it as is.
    pub fn apply(&self, delta: WorkingSetDelta) -> WorkingSet {
        let replace_primary = delta.replaces_primary();
        let replace_derived = delta.replaces_derived();
        WorkingSet {
            primary_items: if replace_primary {
                delta.primary_items
            } else {
                self.primary_items.clone()
            },
            derived_items: if replace_derived {
                delta.derived_items
            } else {
                self.derived_items.clone()
            },
        }
    }

    pub fn merged<'a, I>(&self, objects: I) -> WorkingSet
    where
        I: IntoIterator<Item = &'a CreatedObject>,
    {
        self.apply(WorkingSetDelta::collect(objects))
    }
}
