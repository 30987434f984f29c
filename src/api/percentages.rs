use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::AppState;
use crate::constants::{METRIC_NAME_MAPPING, PERCENTAGE_WINDOW_SECS};
use crate::stats::trailing_changes;

#[derive(Debug, Serialize)]
pub struct PercentagesResponse {
    pub percentages: BTreeMap<String, f64>,
}

/// `GET /api/percentages`: last hour against the hour before, per metric.
pub async fn percentages(State(state): State<Arc<AppState>>) -> Json<PercentagesResponse> {
    let percentages = trailing_changes(
        &state.store,
        METRIC_NAME_MAPPING.iter().copied(),
        state.clock.now(),
        Duration::from_secs(PERCENTAGE_WINDOW_SECS),
    );

    Json(PercentagesResponse { percentages })
}
