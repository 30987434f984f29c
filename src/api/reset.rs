use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub success: bool,
    pub message: &'static str,
}

/// `POST /api/reset`
pub async fn reset(State(state): State<Arc<AppState>>) -> Json<ResetResponse> {
    state.store.reset();
    info!(target: "sensorium::api", "All stored metrics cleared");

    Json(ResetResponse {
        success: true,
        message: "All data has been cleared successfully",
    })
}

/// `GET /api/reset`
pub async fn describe() -> Json<Value> {
    Json(json!({
        "message": "Data reset endpoint",
        "method": "POST",
        "description": "Clears all stored raw samples, aggregates and latest values",
    }))
}
