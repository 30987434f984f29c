use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::AppState;
use crate::constants::ENGINE_VERSION;
use crate::store::StoreStats;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub series: usize,
    pub store: StoreStats,
}

/// `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: ENGINE_VERSION,
        uptime_secs: state.started.elapsed().as_secs(),
        series: state.store.metric_count(),
        store: state.store.stats(),
    })
}
