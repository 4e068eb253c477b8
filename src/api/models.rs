use axum::{
    Json,
    body::Body,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bundle::ExportBundle;
use crate::error::SyncError;
use crate::storage::{BackendDescriptor, IntegrityReport};

/// Keys the browser client keeps its data under in local storage
pub const LOCAL_STORAGE_KEYS: [&str; 2] = ["todo-projects", "todo-items"];

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub data: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateRequest {
    pub local_storage_data: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub message: String,
    pub imported_projects: usize,
    pub imported_items: usize,
    pub data: ExportBundle,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateResponse {
    pub message: String,
    pub migrated_projects: usize,
    pub migrated_items: usize,
    pub data: ExportBundle,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub databases: Vec<BackendDescriptor>,
    pub recommended: BackendDescriptor,
    pub integrity: IntegrityReport,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigCheckResponse {
    pub has_api_key: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageCheckResponse {
    pub message: String,
    pub note: String,
    pub suggestion: String,
    pub local_storage_keys: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            details: None,
        }
    }

    pub fn with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            details: Some(details.into()),
        }
    }

    pub fn internal(e: impl std::fmt::Display) -> Response<Body> {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(Self::new(e.to_string()))).into_response()
    }

    pub fn bad_request(message: impl Into<String>) -> Response<Body> {
        (StatusCode::BAD_REQUEST, Json(Self::new(message))).into_response()
    }

    /// `message` says what failed, the error itself goes into `details`
    pub fn from_sync_error(message: impl Into<String>, e: &SyncError) -> Response<Body> {
        (e.status_code(), Json(Self::with_details(message, e.to_string()))).into_response()
    }
}
