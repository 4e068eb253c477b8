//! The full-snapshot transfer format shared by export, import and migrate.
//!
//! Payloads arrive as untyped JSON from browsers that kept their data in
//! local storage, so the shape is checked here before anything reaches the
//! store: both collections must be present, must be arrays, and every entry
//! must match the record schema.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::{SyncError, SyncResult};
use crate::project::Project;
use crate::todo::TodoItem;

/// Serialized on the way out only; inbound payloads go through
/// [`ExportBundle::from_value`].
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ExportBundle {
    pub projects: Vec<Project>,
    pub items: Vec<TodoItem>,
}

impl ExportBundle {
    pub fn new(projects: Vec<Project>, items: Vec<TodoItem>) -> Self {
        Self { projects, items }
    }

    /// Validate an untyped payload into a bundle.
    pub fn from_value(value: &Value) -> SyncResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| SyncError::validation("bundle must be a JSON object"))?;

        Ok(Self {
            projects: parse_collection(object, "projects")?,
            items: parse_collection(object, "items")?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty() && self.items.is_empty()
    }

    /// Trim every record and collapse duplicate identifiers, keeping the
    /// last occurrence at the position of the first.
    pub fn normalized(self) -> SyncResult<Self> {
        let projects = self
            .projects
            .into_iter()
            .map(Project::normalized)
            .collect::<SyncResult<Vec<_>>>()?;
        let items = self
            .items
            .into_iter()
            .map(TodoItem::normalized)
            .collect::<SyncResult<Vec<_>>>()?;

        Ok(Self {
            projects: dedup_last_wins(projects, |p| p.id.clone()),
            items: dedup_last_wins(items, |i| i.id.clone()),
        })
    }
}

fn parse_collection<T: DeserializeOwned>(
    object: &Map<String, Value>,
    field: &str,
) -> SyncResult<Vec<T>> {
    let raw = match object.get(field) {
        None | Some(Value::Null) => {
            return Err(SyncError::validation(format!("'{field}' is required")));
        }
        Some(raw) => raw,
    };

    let entries = raw
        .as_array()
        .ok_or_else(|| SyncError::validation(format!("'{field}' must be an array")))?;

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            <T as Deserialize>::deserialize(entry)
                .map_err(|e| SyncError::validation(format!("{field}[{index}]: {e}")))
        })
        .collect()
}

fn dedup_last_wins<T>(records: Vec<T>, key: impl Fn(&T) -> String) -> Vec<T> {
    let mut order: Vec<String> = Vec::new();
    let mut latest: HashMap<String, T> = HashMap::new();

    for record in records {
        let id = key(&record);
        if latest.insert(id.clone(), record).is_none() {
            order.push(id);
        }
    }

    order
        .into_iter()
        .filter_map(|id| latest.remove(&id))
        .collect()
}
