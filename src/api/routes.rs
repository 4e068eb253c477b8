use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(handlers::health_check))
        .route("/api/storage-check", get(handlers::storage_check))
        .route("/api/config-check", get(handlers::config_check))
        .route("/api/export", get(handlers::export_data))
        .route("/api/import", post(handlers::import_data))
        .route("/api/migrate", post(handlers::migrate_data))
        .route("/api/status", get(handlers::status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
