use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncResult;
use crate::utils::text::{require_trimmed, trim_optional};

/// A single todo entry belonging to a project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TodoItem {
    pub id: String,
    pub project_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, alias = "completed")]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl TodoItem {
    pub fn new(
        id: impl Into<String>,
        project_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            project_id: project_id.into(),
            title: title.into(),
            description: None,
            done: false,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    /// Trim identifiers and text. Blank ids or titles are rejected, a blank
    /// description becomes `None`.
    pub fn normalized(self) -> SyncResult<Self> {
        let id = require_trimmed(&self.id, "item id")?;
        let project_id = require_trimmed(&self.project_id, &format!("projectId of item '{id}'"))?;
        let title = require_trimmed(&self.title, &format!("title of item '{id}'"))?;

        Ok(Self {
            id,
            project_id,
            title,
            description: trim_optional(self.description),
            done: self.done,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_new_defaults() {
        let item = TodoItem::new("i1", "p1", "Buy milk");
        assert!(!item.done);
        assert!(item.description.is_none());
        assert_eq!(item.created_at, item.updated_at);
    }

    #[test]
    fn test_item_wire_format() {
        let item: TodoItem = serde_json::from_value(json!({
            "id": "i1",
            "projectId": "p1",
            "title": "Buy milk",
            "done": false
        }))
        .unwrap();
        assert_eq!(item.project_id, "p1");

        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(
            value,
            json!({"id": "i1", "projectId": "p1", "title": "Buy milk", "done": false})
        );
    }

    #[test]
    fn test_completed_alias() {
        let item: TodoItem = serde_json::from_value(json!({
            "id": "i1",
            "projectId": "p1",
            "title": "Buy milk",
            "completed": true
        }))
        .unwrap();
        assert!(item.done);
    }

    #[test]
    fn test_normalized() {
        let mut item = TodoItem::new(" i1", "p1 ", " Buy milk ");
        item.description = Some("   ".to_string());
        let item = item.normalized().unwrap();
        assert_eq!(item.id, "i1");
        assert_eq!(item.project_id, "p1");
        assert_eq!(item.title, "Buy milk");
        assert_eq!(item.description, None);
    }

    #[test]
    fn test_normalized_rejects_missing_project_reference() {
        let item = TodoItem::new("i1", "  ", "Buy milk");
        let err = item.normalized().unwrap_err();
        assert!(err.to_string().contains("projectId of item 'i1'"));
    }
}
