use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::Value;
use tracing::warn;

use crate::bundle::ExportBundle;
use crate::error::SyncResult;
use crate::storage::recommend;

use super::models::{
    ConfigCheckResponse, ErrorResponse, ImportRequest, ImportResponse, LOCAL_STORAGE_KEYS,
    MigrateRequest, MigrateResponse, StatusResponse, StorageCheckResponse,
};
use super::state::AppState;

pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn storage_check() -> impl IntoResponse {
    Json(StorageCheckResponse {
        message: "Local storage lives in the browser and cannot be read by the server"
            .to_string(),
        note: "The server only sees data once it has been imported or migrated".to_string(),
        suggestion: "Export local storage from the browser and POST it to /api/migrate"
            .to_string(),
        local_storage_keys: LOCAL_STORAGE_KEYS.iter().map(|k| k.to_string()).collect(),
        timestamp: Utc::now(),
    })
}

pub async fn config_check(State(state): State<AppState>) -> impl IntoResponse {
    let has_api_key = state.config.has_api_key();
    let message = if has_api_key {
        "API key is configured"
    } else {
        "API key is not configured; AI features are disabled"
    };

    Json(ConfigCheckResponse {
        has_api_key,
        message: message.to_string(),
    })
}

pub async fn export_data(State(state): State<AppState>) -> Response {
    match state.manager.export_data() {
        Ok(bundle) => (StatusCode::OK, Json(bundle)).into_response(),
        Err(e) => ErrorResponse::from_sync_error("Failed to export data", &e),
    }
}

pub async fn import_data(
    State(state): State<AppState>,
    payload: Result<Json<ImportRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return reject_body(rejection),
    };

    let bundle = match parse_bundle(req.data, "data") {
        Ok(bundle) => bundle,
        Err(response) => return response,
    };

    match state.manager.import_data(bundle) {
        Ok(outcome) => {
            let response = ImportResponse {
                message: "Data imported successfully".to_string(),
                imported_projects: outcome.project_count(),
                imported_items: outcome.item_count(),
                data: outcome.bundle,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => ErrorResponse::from_sync_error("Failed to import data", &e),
    }
}

pub async fn migrate_data(
    State(state): State<AppState>,
    payload: Result<Json<MigrateRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return reject_body(rejection),
    };

    let bundle = match parse_bundle(req.local_storage_data, "localStorageData") {
        Ok(bundle) => bundle,
        Err(response) => return response,
    };

    match state.manager.migrate_from_local_storage(bundle) {
        Ok(outcome) => {
            let response = MigrateResponse {
                message: "Migration completed successfully".to_string(),
                migrated_projects: outcome.project_count(),
                migrated_items: outcome.item_count(),
                data: outcome.bundle,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => ErrorResponse::from_sync_error("Failed to migrate data", &e),
    }
}

pub async fn status(State(state): State<AppState>) -> Response {
    let detector = state.detector.clone();

    // Remote probes block on the network
    let result = tokio::task::spawn_blocking(move || -> SyncResult<StatusResponse> {
        let databases = detector.detect_all_databases();
        let recommended = recommend(&databases)?;
        let integrity = detector.check_data_integrity()?;
        Ok(StatusResponse {
            databases,
            recommended,
            integrity,
            timestamp: Utc::now(),
        })
    })
    .await;

    match result {
        Ok(Ok(response)) => (StatusCode::OK, Json(response)).into_response(),
        Ok(Err(e)) => ErrorResponse::from_sync_error("Failed to check database status", &e),
        Err(e) => ErrorResponse::internal(e),
    }
}

fn reject_body(rejection: JsonRejection) -> Response {
    warn!("Rejected request body: {}", rejection.body_text());
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::with_details(
            "Invalid request body",
            rejection.body_text(),
        )),
    )
        .into_response()
}

fn parse_bundle(raw: Option<Value>, field: &str) -> Result<ExportBundle, Response> {
    let Some(raw) = raw.filter(|v| !v.is_null()) else {
        return Err(ErrorResponse::bad_request(format!(
            "Missing '{field}' in request body"
        )));
    };

    ExportBundle::from_value(&raw).map_err(|e| {
        warn!("Rejected {} payload: {}", field, e);
        ErrorResponse::from_sync_error(format!("Invalid '{field}' payload"), &e)
    })
}
