// ============================================================================
// ERROR HANDLING FRAMEWORK
// ============================================================================
// One error enum per subsystem, all convertible into `SensoriumError`.
// The store itself is infallible once built: only construction, config,
// and the request boundary can fail.
// ============================================================================

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used across the crate
pub type SensoriumResult<T> = Result<T, SensoriumError>;

/// The main error type for the crate.
#[derive(Error, Debug)]
pub enum SensoriumError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SensoriumError {
    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            SensoriumError::Config(_) => "config",
            SensoriumError::Store(_) => "store",
            SensoriumError::Ingest(_) => "ingest",
            SensoriumError::Query(_) => "query",
            SensoriumError::Io(_) => "io",
            SensoriumError::Internal(_) => "internal",
        }
    }

    /// Whether the caller sent something malformed, as opposed to a fault on our side
    pub fn is_client_error(&self) -> bool {
        matches!(self, SensoriumError::Ingest(_) | SensoriumError::Query(_))
    }
}

// ----------------------------------------------------------------------------
// Configuration Errors
// ----------------------------------------------------------------------------

/// Errors related to configuration loading and validation
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to parse configuration: {message}")]
    ParseError { message: String },

    #[error("Invalid configuration value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Store Construction Errors
// ----------------------------------------------------------------------------

/// Errors raised while sizing the store from settings
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{buffer} capacity must be at least 1")]
    ZeroCapacity { buffer: &'static str },

    #[error("bucket width must be greater than zero")]
    ZeroBucketWidth,

    #[error("no metric keys registered")]
    NoMetrics,
}

// ----------------------------------------------------------------------------
// Ingest Errors
// ----------------------------------------------------------------------------

/// Errors in an inbound sensor payload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("Missing timestamp")]
    MissingTimestamp,

    #[error("Invalid timestamp format")]
    InvalidTimestamp { raw: String },

    #[error("Invalid JSON payload: {message}")]
    InvalidPayload { message: String },
}

// ----------------------------------------------------------------------------
// Query Errors
// ----------------------------------------------------------------------------

/// Errors in query parameters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Invalid aggregation parameter. Use raw, 1min, or 5min")]
    InvalidAggregation { raw: String },

    #[error("Invalid date format. Use ISO strings")]
    InvalidDateRange { raw: String },

    #[error("Invalid range preset. Use 1m, 5m, 30m, 1h, 6h, or 24h")]
    UnknownRangePreset { raw: String },
}
