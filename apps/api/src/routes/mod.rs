pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::analysis::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.settings.max_upload_bytes;

    Router::new()
        .route("/", get(health::root_handler))
        .route("/health", get(health::health_handler))
        // Analysis API
        .route("/api/v1/analyze", post(handlers::handle_analyze))
        .route("/analyze", post(handlers::handle_analyze))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
