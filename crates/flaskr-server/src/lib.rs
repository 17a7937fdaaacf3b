//! flaskr server library logic.

pub mod api;
pub mod cli;
pub mod config;
pub mod middleware;

use axum::{routing::get, Extension, Json, Router};
use flaskr_db::{initialize_schema, ConnectionSettings, ConnectionSlot, DbError, Resources};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// How each request's connection is opened.
    pub db_settings: Arc<ConnectionSettings>,
    /// Bundled resources (schema script).
    pub resources: Resources,
}

impl AppState {
    pub fn from_config(config: &config::Config) -> Self {
        Self {
            db_settings: Arc::new(config.connection_settings()),
            resources: config.resources(),
        }
    }
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/posts", get(api::list_posts_handler))
        .route("/api/posts/{id}", get(api::get_post_handler))
        .layer(axum::middleware::from_fn(middleware::db_scope))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}

/// Clears the existing data and creates new tables.
///
/// Opens a connection through a fresh slot, runs the bundled schema script,
/// and closes the connection again.
pub fn init_db(state: &AppState) -> Result<(), DbError> {
    let mut slot = ConnectionSlot::new(Arc::clone(&state.db_settings));
    let result = initialize_schema(&mut slot, &state.resources);
    slot.release(None);
    result
}
