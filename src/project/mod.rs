use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncResult;
use crate::utils::text::require_trimmed;

/// A grouping container for todo items.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Project {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            created_at: Some(Utc::now()),
        }
    }

    /// Trim the identifier and name, failing if either is blank
    pub fn normalized(self) -> SyncResult<Self> {
        Ok(Self {
            id: require_trimmed(&self.id, "project id")?,
            name: require_trimmed(&self.name, &format!("name of project '{}'", self.id.trim()))?,
            created_at: self.created_at,
        })
    }
}
