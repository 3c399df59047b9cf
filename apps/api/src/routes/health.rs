use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns service status, version and model key availability.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let available = state.key_pool.available();
    let status = if available > 0 { "ok" } else { "degraded" };

    Json(json!({
        "status": status,
        "version": env!("CARGO_PKG_VERSION"),
        "service": "matchlens-api",
        "llmKeys": {
            "configured": state.key_pool.len(),
            "available": available,
            "usage": state.key_pool.stats()
        }
    }))
}
