//! Data items flowing through a batch.
//!
//! The orchestrator never looks inside an item; it only sorts created
//! objects by kind so later steps can pick them up.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a data item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ItemId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// An input-side item, such as an imported raw data file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryItem {
    pub id: ItemId,
    pub name: String,
    /// Step-defined content; opaque to the orchestrator.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl PrimaryItem {
    pub fn new(name: &str) -> Self {
        Self {
            id: ItemId::new(),
            name: name.to_string(),
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// A result-side item, such as a detected peak list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedItem {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl DerivedItem {
    pub fn new(name: &str) -> Self {
        Self {
            id: ItemId::new(),
            name: name.to_string(),
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Something a task reports having produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "item")]
pub enum CreatedObject {
    Primary(PrimaryItem),
    Derived(DerivedItem),
    /// Output the batch does not track (exported files, plots, ...).
    Other(String),
}

impl From<PrimaryItem> for CreatedObject {
    fn from(item: PrimaryItem) -> Self {
        CreatedObject::Primary(item)
    }
}

impl From<DerivedItem> for CreatedObject {
    fn from(item: DerivedItem) -> Self {
        CreatedObject::Derived(item)
    }
}
