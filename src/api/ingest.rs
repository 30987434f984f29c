use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use super::{ApiError, AppState};
use crate::error::IngestError;
use crate::ingest::{self as ingestion, IngestPayload};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub ok: bool,
    pub timestamp: String,
    pub metrics_stored: usize,
}

/// `POST /api/ingest`
///
/// The body is decoded by hand so malformed JSON comes back as a 400 with
/// the same `{ error }` shape as every other rejection.
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<IngestResponse>, ApiError> {
    let payload: IngestPayload = serde_json::from_slice(&body).map_err(|e| IngestError::InvalidPayload {
        message: e.to_string(),
    })?;

    let receipt = ingestion::ingest(&state.store, &payload, state.local_offset)?;

    Ok(Json(IngestResponse {
        ok: true,
        timestamp: receipt.timestamp.to_rfc3339(),
        metrics_stored: receipt.metrics_stored,
    }))
}

/// `GET /api/ingest`
pub async fn describe() -> Json<Value> {
    Json(json!({
        "message": "IoT Analytics Ingest Endpoint",
        "method": "POST",
        "expectedPayload": IngestPayload::example(),
    }))
}
