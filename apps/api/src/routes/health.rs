use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /
pub async fn root_handler() -> Json<Value> {
    Json(json!({ "message": "Welcome to the Resume Matcher API" }))
}

/// GET /health
/// Returns a simple status object with service version and cache counters.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let index_cache = state.retriever.cache();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "resume-matcher",
        "cache": {
            "indexed_documents": index_cache.len(),
            "index_builds": index_cache.build_count(),
            "cached_queries": state.query_cache.len(),
        }
    }))
}
