// ============================================================================
// CONFIGURATION SYSTEM
// ============================================================================
// Configuration management with:
// - TOML file parsing
// - Environment variable overrides (SENSORIUM_ prefix, `__` as separator)
// - Validation
// - Sensible defaults
// ============================================================================

use std::net::SocketAddr;
use std::path::Path;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::ConfigError;
use crate::ingest::parse_offset;

// ----------------------------------------------------------------------------
// Root Configuration
// ----------------------------------------------------------------------------

/// Root configuration for the service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensoriumConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Retention and aggregation settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Ingest payload interpretation
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SensoriumConfig {
    /// Load configuration from file with environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let figment = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("SENSORIUM_").split("__"));

        let config: Self = figment.extract().map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for running without a config file
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: Self = Figment::from(figment::providers::Serialized::defaults(Self::default()))
            .merge(Env::prefixed("SENSORIUM_").split("__"))
            .extract()
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load from string (for testing)
    pub fn from_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.address.parse::<SocketAddr>().map_err(|e| {
            ConfigError::invalid_value("server.address", format!("'{}': {}", self.server.address, e))
        })?;

        let storage = &self.storage;
        if storage.sample_interval_ms == 0 {
            return Err(ConfigError::invalid_value(
                "storage.sample_interval_ms",
                "Sample interval must be greater than zero",
            ));
        }
        if storage.raw_retention_secs.saturating_mul(1000) < storage.sample_interval_ms {
            return Err(ConfigError::invalid_value(
                "storage.raw_retention_secs",
                "Retention window must cover at least one sample interval",
            ));
        }
        if storage.aggregated_capacity == 0 {
            return Err(ConfigError::invalid_value(
                "storage.aggregated_capacity",
                "Aggregated capacity must be at least 1",
            ));
        }
        if storage.bucket_width_ms == 0 {
            return Err(ConfigError::invalid_value(
                "storage.bucket_width_ms",
                "Bucket width must be greater than zero",
            ));
        }
        if storage.coarse_bucket_factor < MIN_COARSE_BUCKET_FACTOR {
            return Err(ConfigError::invalid_value(
                "storage.coarse_bucket_factor",
                format!("Coarse bucket factor must be at least {}", MIN_COARSE_BUCKET_FACTOR),
            ));
        }
        if storage.metrics.is_empty() {
            return Err(ConfigError::invalid_value(
                "storage.metrics",
                "At least one metric key must be registered",
            ));
        }

        parse_offset(&self.ingest.local_offset)?;

        Ok(())
    }

    /// Render the default configuration as TOML
    pub fn generate_default_config() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

// ----------------------------------------------------------------------------
// Server Configuration
// ----------------------------------------------------------------------------

/// HTTP API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_server_addr")]
    pub address: String,

    /// Enable permissive CORS for the dashboard
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Graceful shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_server_addr(),
            cors_enabled: true,
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

fn default_server_addr() -> String {
    format!("0.0.0.0:{}", DEFAULT_HTTP_PORT)
}

fn default_shutdown_timeout() -> u64 {
    SHUTDOWN_GRACE_PERIOD_SECS
}

fn default_true() -> bool {
    true
}

// ----------------------------------------------------------------------------
// Storage Configuration
// ----------------------------------------------------------------------------

/// Retention and aggregation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Raw history kept per metric, in seconds
    #[serde(default = "default_raw_retention")]
    pub raw_retention_secs: u64,

    /// Nominal interval between readings, in milliseconds
    #[serde(default = "default_sample_interval")]
    pub sample_interval_ms: u64,

    /// Finalized aggregates kept per metric and resolution
    #[serde(default = "default_aggregated_capacity")]
    pub aggregated_capacity: usize,

    /// Fine bucket width, in milliseconds
    #[serde(default = "default_bucket_width")]
    pub bucket_width_ms: u64,

    /// Coarse bucket width as a multiple of `bucket_width_ms`
    #[serde(default = "default_coarse_factor")]
    pub coarse_bucket_factor: u64,

    /// Metric keys accepted by the store
    #[serde(default = "default_metrics")]
    pub metrics: Vec<String>,
}

impl StorageConfig {
    /// Raw ring buffer capacity: retention window over sample interval
    pub fn raw_capacity(&self) -> usize {
        if self.sample_interval_ms == 0 {
            return 0;
        }
        (self.raw_retention_secs.saturating_mul(1000) / self.sample_interval_ms) as usize
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            raw_retention_secs: default_raw_retention(),
            sample_interval_ms: default_sample_interval(),
            aggregated_capacity: default_aggregated_capacity(),
            bucket_width_ms: default_bucket_width(),
            coarse_bucket_factor: default_coarse_factor(),
            metrics: default_metrics(),
        }
    }
}

fn default_raw_retention() -> u64 {
    DEFAULT_RAW_RETENTION_SECS
}

fn default_sample_interval() -> u64 {
    DEFAULT_SAMPLE_INTERVAL_MS
}

fn default_aggregated_capacity() -> usize {
    DEFAULT_AGGREGATED_CAPACITY
}

fn default_bucket_width() -> u64 {
    DEFAULT_BUCKET_WIDTH_MS
}

fn default_coarse_factor() -> u64 {
    DEFAULT_COARSE_BUCKET_FACTOR
}

fn default_metrics() -> Vec<String> {
    DEFAULT_METRIC_KEYS.iter().map(|k| k.to_string()).collect()
}

// ----------------------------------------------------------------------------
// Ingest Configuration
// ----------------------------------------------------------------------------

/// How inbound payloads are interpreted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// UTC offset for `YYYY-MM-DD HH:mm:ss` timestamps, e.g. "+05:30"
    #[serde(default = "default_local_offset")]
    pub local_offset: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            local_offset: default_local_offset(),
        }
    }
}

fn default_local_offset() -> String {
    DEFAULT_LOCAL_OFFSET.into()
}

// ----------------------------------------------------------------------------
// Logging Configuration
// ----------------------------------------------------------------------------

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format (json, pretty, compact)
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Enable ANSI colors
    #[serde(default = "default_true")]
    pub colors: bool,

    /// Include source location
    #[serde(default)]
    pub source_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            colors: true,
            source_location: false,
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}
