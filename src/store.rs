// ============================================================================
// METRIC STORE
// ============================================================================
// Per-metric time-series storage:
// - Bounded raw history (retention window / sample interval)
// - Fine and coarse bucket aggregates, folded incrementally on write
// - Latest written value per metric
// - Inclusive range queries at raw, 1min or 5min resolution
//
// The key set is fixed when the store is built. Each series sits behind its
// own lock, so writers to different metrics never contend.
// ============================================================================

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::num::{NonZeroU64, NonZeroUsize};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use compact_str::CompactString;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::bucketer::{Aggregate, Bucketer, FoldOutcome, OpenBucket};
use crate::config::StorageConfig;
use crate::error::{QueryError, StoreError};
use crate::ring_buffer::BoundedRingBuffer;
use crate::timestamp::Timestamp;

// ----------------------------------------------------------------------------
// Points, Ranges & Resolutions
// ----------------------------------------------------------------------------

/// A single stored reading, also the shape returned by every query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub ts: Timestamp,
    pub value: f64,
}

impl Sample {
    #[inline]
    pub fn new(ts: Timestamp, value: f64) -> Self {
        Self { ts, value }
    }
}

impl From<&Aggregate> for Sample {
    fn from(agg: &Aggregate) -> Self {
        Self {
            ts: agg.bucket_start,
            value: agg.avg,
        }
    }
}

/// Inclusive time range `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: Timestamp,
    pub to: Timestamp,
}

impl TimeRange {
    pub fn new(from: Timestamp, to: Timestamp) -> Self {
        Self { from, to }
    }

    #[inline]
    pub fn contains(&self, ts: Timestamp) -> bool {
        ts.is_within(self.from, self.to)
    }
}

/// Granularity of a query response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Resolution {
    #[default]
    #[serde(rename = "raw")]
    Raw,
    #[serde(rename = "1min")]
    OneMinute,
    #[serde(rename = "5min")]
    FiveMinutes,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Raw => "raw",
            Resolution::OneMinute => "1min",
            Resolution::FiveMinutes => "5min",
        }
    }
}

impl FromStr for Resolution {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(Resolution::Raw),
            "1min" => Ok(Resolution::OneMinute),
            "5min" => Ok(Resolution::FiveMinutes),
            other => Err(QueryError::InvalidAggregation { raw: other.to_string() }),
        }
    }
}

impl Display for Resolution {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ----------------------------------------------------------------------------
// Store Settings
// ----------------------------------------------------------------------------

/// Validated sizing for every series in a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSettings {
    pub raw_capacity: NonZeroUsize,
    pub aggregated_capacity: NonZeroUsize,
    pub bucket_width_ms: NonZeroU64,
    pub coarse_factor: NonZeroU64,
}

impl StoreSettings {
    pub fn from_config(config: &StorageConfig) -> Result<Self, StoreError> {
        let raw_capacity = NonZeroUsize::new(config.raw_capacity())
            .ok_or(StoreError::ZeroCapacity { buffer: "raw" })?;
        let aggregated_capacity = NonZeroUsize::new(config.aggregated_capacity)
            .ok_or(StoreError::ZeroCapacity { buffer: "aggregated" })?;
        let bucket_width_ms =
            NonZeroU64::new(config.bucket_width_ms).ok_or(StoreError::ZeroBucketWidth)?;
        let coarse_factor =
            NonZeroU64::new(config.coarse_bucket_factor).ok_or(StoreError::ZeroBucketWidth)?;

        Ok(Self {
            raw_capacity,
            aggregated_capacity,
            bucket_width_ms,
            coarse_factor,
        })
    }

    /// Width of the coarse (5min) bucket
    pub fn coarse_width_ms(&self) -> NonZeroU64 {
        self.bucket_width_ms.saturating_mul(self.coarse_factor)
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        // Defaults are non-zero constants, so the config path cannot fail here.
        Self::from_config(&StorageConfig::default()).unwrap_or(Self {
            raw_capacity: NonZeroUsize::MIN,
            aggregated_capacity: NonZeroUsize::MIN,
            bucket_width_ms: NonZeroU64::MIN,
            coarse_factor: NonZeroU64::MIN,
        })
    }
}

// ----------------------------------------------------------------------------
// Metric Series
// ----------------------------------------------------------------------------

#[derive(Debug)]
struct MetricSeries {
    raw: BoundedRingBuffer<Sample>,
    one_min: Bucketer,
    five_min: Bucketer,
    latest: Option<f64>,
}

impl MetricSeries {
    fn new(settings: &StoreSettings) -> Self {
        Self {
            raw: BoundedRingBuffer::new(settings.raw_capacity),
            one_min: Bucketer::new(settings.bucket_width_ms, settings.aggregated_capacity),
            five_min: Bucketer::new(settings.coarse_width_ms(), settings.aggregated_capacity),
            latest: None,
        }
    }

    fn bucketer(&self, resolution: Resolution) -> Option<&Bucketer> {
        match resolution {
            Resolution::Raw => None,
            Resolution::OneMinute => Some(&self.one_min),
            Resolution::FiveMinutes => Some(&self.five_min),
        }
    }

    fn clear(&mut self) {
        self.raw.clear();
        self.one_min.reset();
        self.five_min.reset();
        self.latest = None;
    }
}

/// Point-in-time counters for one series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesStats {
    pub key: String,
    pub raw_len: usize,
    pub raw_capacity: usize,
    pub raw_evicted: u64,
    pub one_min_len: usize,
    pub five_min_len: usize,
    pub latest: Option<f64>,
}

/// Point-in-time counters for the whole store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total_writes: u64,
    pub rejected_writes: u64,
    pub series: Vec<SeriesStats>,
}

// ----------------------------------------------------------------------------
// Metric Store
// ----------------------------------------------------------------------------

/// The process-wide sensor time-series store.
///
/// Build one at startup and share it behind an `Arc`.
#[derive(Debug)]
pub struct MetricStore {
    series: BTreeMap<CompactString, RwLock<MetricSeries>>,
    settings: StoreSettings,
    total_writes: AtomicU64,
    rejected_writes: AtomicU64,
}

impl MetricStore {
    /// Create a store with one series per key.
    pub fn new<I, S>(keys: I, settings: StoreSettings) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let series: BTreeMap<CompactString, RwLock<MetricSeries>> = keys
            .into_iter()
            .map(|k| (CompactString::from(k.as_ref()), RwLock::new(MetricSeries::new(&settings))))
            .collect();

        if series.is_empty() {
            return Err(StoreError::NoMetrics);
        }

        debug!(
            target: "sensorium::store",
            metrics = series.len(),
            raw_capacity = settings.raw_capacity.get(),
            aggregated_capacity = settings.aggregated_capacity.get(),
            bucket_width_ms = settings.bucket_width_ms.get(),
            "Metric store created"
        );

        Ok(Self {
            series,
            settings,
            total_writes: AtomicU64::new(0),
            rejected_writes: AtomicU64::new(0),
        })
    }

    /// Create a store sized and keyed from configuration
    pub fn from_config(config: &StorageConfig) -> Result<Self, StoreError> {
        Self::new(&config.metrics, StoreSettings::from_config(config)?)
    }

    /// Record one reading.
    ///
    /// Writes to unregistered keys are dropped; the return value says whether
    /// the write was accepted.
    pub fn write(&self, key: &str, value: f64, timestamp: Timestamp) -> bool {
        let Some(series) = self.series.get(key) else {
            self.rejected_writes.fetch_add(1, AtomicOrdering::Relaxed);
            debug!(target: "sensorium::store", key, "Dropping write for unregistered metric");
            return false;
        };

        let mut guard = series.write();
        let series = &mut *guard;
        series.raw.push(Sample::new(timestamp, value));
        series.latest = Some(value);

        for bucketer in [&mut series.one_min, &mut series.five_min] {
            match bucketer.fold(value, timestamp) {
                FoldOutcome::Rolled { finalized, late: true } => {
                    warn!(
                        target: "sensorium::store",
                        key,
                        width_ms = bucketer.width_ms(),
                        closed_bucket = finalized.bucket_start.as_millis(),
                        timestamp = timestamp.as_millis(),
                        "Late write closed the open bucket early"
                    );
                }
                FoldOutcome::Rolled { finalized, late: false } => {
                    trace!(
                        target: "sensorium::store",
                        key,
                        width_ms = bucketer.width_ms(),
                        bucket_start = finalized.bucket_start.as_millis(),
                        count = finalized.count,
                        "Bucket finalized"
                    );
                }
                FoldOutcome::Opened | FoldOutcome::Accumulated => {}
            }
        }

        self.total_writes.fetch_add(1, AtomicOrdering::Relaxed);
        true
    }

    /// Points for `key` at `resolution`, in insertion order.
    ///
    /// Aggregated resolutions return one point per finalized bucket, stamped
    /// with the bucket start and carrying the bucket average. The open bucket
    /// is not included. Unknown keys yield an empty vector.
    pub fn query(&self, key: &str, range: Option<TimeRange>, resolution: Resolution) -> Vec<Sample> {
        let Some(series) = self.series.get(key) else {
            return Vec::new();
        };
        let series = series.read();

        match series.bucketer(resolution) {
            None => match range {
                Some(range) => series.raw.snapshot_filtered(|s| range.contains(s.ts)),
                None => series.raw.snapshot(),
            },
            Some(bucketer) => bucketer
                .aggregates()
                .iter()
                .filter(|agg| range.map_or(true, |r| r.contains(agg.bucket_start)))
                .map(Sample::from)
                .collect(),
        }
    }

    /// Full finalized aggregates (avg/min/max/count) for an aggregated
    /// resolution. `Resolution::Raw` has no aggregates and yields nothing.
    pub fn aggregates(&self, key: &str, range: Option<TimeRange>, resolution: Resolution) -> Vec<Aggregate> {
        let Some(series) = self.series.get(key) else {
            return Vec::new();
        };
        let series = series.read();

        match series.bucketer(resolution) {
            None => Vec::new(),
            Some(bucketer) => bucketer
                .aggregates()
                .snapshot_filtered(|agg| range.map_or(true, |r| r.contains(agg.bucket_start))),
        }
    }

    /// The bucket currently accumulating for `key` at `resolution`.
    pub fn open_bucket(&self, key: &str, resolution: Resolution) -> Option<OpenBucket> {
        let series = self.series.get(key)?.read();
        series.bucketer(resolution)?.open_bucket().copied()
    }

    /// Latest written value of `key`.
    pub fn latest(&self, key: &str) -> Option<f64> {
        self.series.get(key)?.read().latest
    }

    /// Latest written value of every key that has one.
    pub fn latest_snapshot(&self) -> BTreeMap<String, f64> {
        self.series
            .iter()
            .filter_map(|(key, series)| series.read().latest.map(|v| (key.to_string(), v)))
            .collect()
    }

    /// Mean of raw values with `ts ∈ [from, to]`.
    ///
    /// Returns 0 when nothing matches, so an empty window is indistinguishable
    /// from a window averaging to zero.
    pub fn average_over(&self, key: &str, from: Timestamp, to: Timestamp) -> f64 {
        let Some(series) = self.series.get(key) else {
            return 0.0;
        };
        let series = series.read();

        let (sum, count) = series
            .raw
            .iter()
            .filter(|s| s.ts.is_within(from, to))
            .fold((0.0, 0usize), |(sum, count), s| (sum + s.value, count + 1));

        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }

    /// Empty every series. Registered keys stay registered.
    pub fn reset(&self) {
        for series in self.series.values() {
            series.write().clear();
        }
        self.total_writes.store(0, AtomicOrdering::Relaxed);
        self.rejected_writes.store(0, AtomicOrdering::Relaxed);
        debug!(target: "sensorium::store", metrics = self.series.len(), "Metric store reset");
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.series.keys().map(|k| k.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.series.contains_key(key)
    }

    pub fn metric_count(&self) -> usize {
        self.series.len()
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    pub fn stats(&self) -> StoreStats {
        let series = self
            .series
            .iter()
            .map(|(key, series)| {
                let series = series.read();
                SeriesStats {
                    key: key.to_string(),
                    raw_len: series.raw.len(),
                    raw_capacity: series.raw.capacity(),
                    raw_evicted: series.raw.evicted(),
                    one_min_len: series.one_min.aggregates().len(),
                    five_min_len: series.five_min.aggregates().len(),
                    latest: series.latest,
                }
            })
            .collect();

        StoreStats {
            total_writes: self.total_writes.load(AtomicOrdering::Relaxed),
            rejected_writes: self.rejected_writes.load(AtomicOrdering::Relaxed),
            series,
        }
    }
}
