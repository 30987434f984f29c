use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ApiError, AppState};
use crate::constants::{DEFAULT_REQUESTED_METRICS, METRIC_NAME_MAPPING, SLOW_QUERY_THRESHOLD_MS};
use crate::error::QueryError;
use crate::ingest::parse_iso;
use crate::logging::PerfTimer;
use crate::store::{Resolution, Sample, TimeRange};
use crate::timestamp::Timestamp;

/// Storage key behind a dashboard metric name.
pub fn storage_key(name: &str) -> Option<&'static str> {
    METRIC_NAME_MAPPING
        .iter()
        .find(|(display, _)| *display == name)
        .map(|(_, key)| *key)
}

// ----------------------------------------------------------------------------
// Range Presets
// ----------------------------------------------------------------------------

/// Trailing windows offered by the dashboard's range picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePreset {
    OneMinute,
    FiveMinutes,
    ThirtyMinutes,
    OneHour,
    SixHours,
    OneDay,
}

impl RangePreset {
    pub fn duration(&self) -> Duration {
        let minutes = match self {
            RangePreset::OneMinute => 1,
            RangePreset::FiveMinutes => 5,
            RangePreset::ThirtyMinutes => 30,
            RangePreset::OneHour => 60,
            RangePreset::SixHours => 6 * 60,
            RangePreset::OneDay => 24 * 60,
        };
        Duration::from_secs(minutes * 60)
    }

    /// The window ending at `now`.
    pub fn ending_at(&self, now: Timestamp) -> TimeRange {
        TimeRange::new(now.sub_duration(self.duration()), now)
    }
}

impl FromStr for RangePreset {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(RangePreset::OneMinute),
            "5m" => Ok(RangePreset::FiveMinutes),
            "30m" => Ok(RangePreset::ThirtyMinutes),
            "1h" => Ok(RangePreset::OneHour),
            "6h" => Ok(RangePreset::SixHours),
            "24h" => Ok(RangePreset::OneDay),
            other => Err(QueryError::UnknownRangePreset { raw: other.to_string() }),
        }
    }
}

// ----------------------------------------------------------------------------
// Handler
// ----------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct MetricsQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub metrics: Option<String>,
    pub agg: Option<String>,
    pub range: Option<String>,
}

impl MetricsQuery {
    /// Explicit `from`/`to` win; a preset applies only when either is absent.
    fn time_range(&self, now: Timestamp) -> Result<Option<TimeRange>, QueryError> {
        let from = self.from.as_deref().filter(|s| !s.is_empty());
        let to = self.to.as_deref().filter(|s| !s.is_empty());

        if let (Some(from), Some(to)) = (from, to) {
            return Ok(Some(TimeRange::new(parse_iso(from)?, parse_iso(to)?)));
        }

        match self.range.as_deref().filter(|s| !s.is_empty()) {
            Some(preset) => Ok(Some(preset.parse::<RangePreset>()?.ending_at(now))),
            None => Ok(None),
        }
    }

    fn resolution(&self) -> Result<Resolution, QueryError> {
        match self.agg.as_deref().filter(|s| !s.is_empty()) {
            Some(agg) => agg.parse(),
            None => Ok(Resolution::Raw),
        }
    }

    fn requested_metrics(&self) -> Vec<&str> {
        self.metrics
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_REQUESTED_METRICS)
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct RangeEcho {
    pub from: String,
    pub to: String,
}

impl RangeEcho {
    fn from_range(range: Option<TimeRange>) -> Self {
        match range {
            Some(range) => Self {
                from: range.from.to_rfc3339(),
                to: range.to.to_rfc3339(),
            },
            None => Self {
                from: "all".into(),
                to: "all".into(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsResponse {
    pub range: RangeEcho,
    pub samples: BTreeMap<String, Vec<Sample>>,
    pub latest: BTreeMap<String, f64>,
    pub aggregation: Resolution,
    pub sample_counts: BTreeMap<String, usize>,
}

/// `GET /api/metrics?from&to&metrics&agg&range`
pub async fn metrics(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<MetricsResponse>, ApiError> {
    let resolution = query.resolution()?;
    let range = query.time_range(state.clock.now())?;

    let timer = PerfTimer::with_threshold("metrics_query", SLOW_QUERY_THRESHOLD_MS);

    let samples: BTreeMap<String, Vec<Sample>> = query
        .requested_metrics()
        .into_iter()
        .filter_map(|name| storage_key(name).map(|key| (name, key)))
        .map(|(name, key)| (name.to_string(), state.store.query(key, range, resolution)))
        .collect();

    let snapshot = state.store.latest_snapshot();
    let latest = METRIC_NAME_MAPPING
        .iter()
        .map(|(name, key)| (name.to_string(), snapshot.get(*key).copied().unwrap_or(0.0)))
        .collect();

    let sample_counts = samples.iter().map(|(name, points)| (name.clone(), points.len())).collect();

    let elapsed_us = timer.stop();
    debug!(
        target: "sensorium::api",
        metrics = samples.len(),
        resolution = %resolution,
        ranged = range.is_some(),
        elapsed_us,
        "Metrics query served"
    );

    Ok(Json(MetricsResponse {
        range: RangeEcho::from_range(range),
        samples,
        latest,
        aggregation: resolution,
        sample_counts,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: Timestamp = Timestamp::from_secs(1_735_689_600);

    #[test]
    fn test_storage_key_mapping() {
        assert_eq!(storage_key("current"), Some("current_A"));
        assert_eq!(storage_key("voltage"), Some("voltage"));
        assert_eq!(storage_key("current_A"), None);
        assert_eq!(storage_key("pressure"), None);
    }

    #[test]
    fn test_range_presets() {
        assert_eq!("30m".parse::<RangePreset>().unwrap().duration(), Duration::from_secs(1800));
        assert_eq!("24h".parse::<RangePreset>().unwrap().duration(), Duration::from_secs(86_400));
        assert!(matches!(
            "2d".parse::<RangePreset>(),
            Err(QueryError::UnknownRangePreset { .. })
        ));

        let window = RangePreset::FiveMinutes.ending_at(NOW);
        assert_eq!(window.to, NOW);
        assert_eq!(NOW.as_millis() - window.from.as_millis(), 300_000);
    }

    #[test]
    fn test_range_requires_both_bounds() {
        let query = MetricsQuery {
            from: Some("2025-01-01T00:00:00Z".into()),
            ..Default::default()
        };
        assert_eq!(query.time_range(NOW).unwrap(), None);

        let query = MetricsQuery {
            from: Some("2025-01-01T00:00:00Z".into()),
            range: Some("1h".into()),
            ..Default::default()
        };
        assert_eq!(query.time_range(NOW).unwrap(), Some(RangePreset::OneHour.ending_at(NOW)));
    }

    #[test]
    fn test_explicit_bounds_override_preset() {
        let query = MetricsQuery {
            from: Some("2025-01-01T00:00:00Z".into()),
            to: Some("2025-01-01T00:00:05Z".into()),
            range: Some("bogus".into()),
            ..Default::default()
        };
        let range = query.time_range(NOW).unwrap().unwrap();
        assert_eq!(range.to.as_millis() - range.from.as_millis(), 5000);
    }

    #[test]
    fn test_requested_metrics_default_and_trim() {
        assert_eq!(MetricsQuery::default().requested_metrics().len(), 6);

        let query = MetricsQuery {
            metrics: Some(" voltage , current,,".into()),
            ..Default::default()
        };
        assert_eq!(query.requested_metrics(), vec!["voltage", "current"]);
    }
}
