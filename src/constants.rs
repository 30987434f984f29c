// ============================================================================
// CONSTANTS & VERSION INFORMATION
// ============================================================================
// Defaults that shape retention, aggregation and the service surface.
// Every storage default can be overridden through configuration.
// ============================================================================

/// Engine version - follows semantic versioning
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const ENGINE_NAME: &str = "sensorium";
pub const ENGINE_FULL_NAME: &str = "Sensorium IoT Metrics Store";

// ----------------------------------------------------------------------------
// Retention & Buffer Sizes
// ----------------------------------------------------------------------------

/// Raw history retained per metric (seconds)
pub const DEFAULT_RAW_RETENTION_SECS: u64 = 3600;

/// Nominal interval between sensor readings (milliseconds)
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 5000;

/// Finalized aggregates kept per metric and resolution
pub const DEFAULT_AGGREGATED_CAPACITY: usize = 1000;

// ----------------------------------------------------------------------------
// Aggregation
// ----------------------------------------------------------------------------

/// Width of the fine aggregation bucket (milliseconds)
pub const DEFAULT_BUCKET_WIDTH_MS: u64 = 60_000;

/// Coarse bucket width as a multiple of the fine width
pub const DEFAULT_COARSE_BUCKET_FACTOR: u64 = 5;

/// Minimum coarse factor (a factor of 1 would duplicate the fine series)
pub const MIN_COARSE_BUCKET_FACTOR: u64 = 2;

// ----------------------------------------------------------------------------
// Metrics
// ----------------------------------------------------------------------------

/// Storage keys registered when the store is built
pub const DEFAULT_METRIC_KEYS: [&str; 9] = [
    "voltage",
    "current_A",
    "frequency_Hz",
    "energy_kWh",
    "temp.CH1",
    "temp.CH2",
    "temp.CH3",
    "temp.CH5",
    "vibration",
];

/// Dashboard-facing metric names and the storage keys they read from
pub const METRIC_NAME_MAPPING: [(&str, &str); 9] = [
    ("voltage", "voltage"),
    ("current", "current_A"),
    ("temp.CH1", "temp.CH1"),
    ("temp.CH2", "temp.CH2"),
    ("temp.CH3", "temp.CH3"),
    ("temp.CH5", "temp.CH5"),
    ("vibration", "vibration"),
    ("frequency_Hz", "frequency_Hz"),
    ("energy_kWh", "energy_kWh"),
];

/// Metrics returned by the query endpoint when none are requested
pub const DEFAULT_REQUESTED_METRICS: &str = "voltage,current,temp.CH1,temp.CH2,temp.CH3,vibration";

// ----------------------------------------------------------------------------
// Statistics
// ----------------------------------------------------------------------------

/// Width of each window compared by the percentage endpoint (seconds)
pub const PERCENTAGE_WINDOW_SECS: u64 = 3600;

// ----------------------------------------------------------------------------
// Network & Ingest
// ----------------------------------------------------------------------------

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 3008;

/// Offset applied to `YYYY-MM-DD HH:mm:ss` timestamps that carry no zone
pub const DEFAULT_LOCAL_OFFSET: &str = "+05:30";

/// Grace period for shutdown (seconds)
pub const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 30;

/// Queries slower than this are logged at warn level (milliseconds)
pub const SLOW_QUERY_THRESHOLD_MS: u64 = 50;

// ----------------------------------------------------------------------------
// Simulation
// ----------------------------------------------------------------------------

/// Default interval between simulated payloads (milliseconds)
pub const DEFAULT_SIMULATE_INTERVAL_MS: u64 = 5000;

/// Default ingest endpoint targeted by the simulator
pub const DEFAULT_SIMULATE_URL: &str = "http://localhost:3008/api/ingest";
