// ============================================================================
// HTTP API
// ============================================================================
// Dashboard-facing JSON endpoints over a shared `MetricStore`:
//
//   POST /api/ingest       write one gateway payload
//   GET  /api/metrics      raw / 1min / 5min series plus latest values
//   GET  /api/percentages  trailing-hour change per metric
//   POST /api/reset        drop all stored data
//   GET  /health           liveness and store size
// ============================================================================

pub mod error;
pub mod health;
pub mod ingest;
pub mod metrics;
pub mod percentages;
pub mod reset;

use std::sync::Arc;
use std::time::Instant;

use axum::routing::get;
use axum::Router;
use chrono::FixedOffset;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::SensoriumConfig;
use crate::error::SensoriumResult;
use crate::ingest::parse_offset;
use crate::store::MetricStore;
use crate::timestamp::{Clock, SystemClock};

pub use error::ApiError;

/// Shared state handed to every handler.
pub struct AppState {
    pub store: Arc<MetricStore>,
    pub clock: Arc<dyn Clock>,
    pub local_offset: FixedOffset,
    pub started: Instant,
}

impl AppState {
    pub fn new(store: Arc<MetricStore>, clock: Arc<dyn Clock>, local_offset: FixedOffset) -> Self {
        Self {
            store,
            clock,
            local_offset,
            started: Instant::now(),
        }
    }

    /// Build state from configuration with a fresh store and the system clock.
    pub fn from_config(config: &SensoriumConfig) -> SensoriumResult<Self> {
        let store = MetricStore::from_config(&config.storage)?;
        let local_offset = parse_offset(&config.ingest.local_offset)?;
        Ok(Self::new(Arc::new(store), Arc::new(SystemClock), local_offset))
    }
}

/// Assemble the router. CORS is permissive when enabled, for the dashboard
/// served from a different origin.
pub fn create_router(state: Arc<AppState>, cors_enabled: bool) -> Router {
    let router = Router::new()
        .route("/api/ingest", get(ingest::describe).post(ingest::ingest))
        .route("/api/metrics", get(metrics::metrics))
        .route("/api/percentages", get(percentages::percentages))
        .route("/api/reset", get(reset::describe).post(reset::reset))
        .route("/health", get(health::health))
        .with_state(state);

    let router = if cors_enabled {
        router.layer(CorsLayer::permissive())
    } else {
        router
    };

    router.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}
