// ============================================================================
// LOGGING & TIMING
// ============================================================================

use std::str::FromStr;
use std::time::Instant;

use tracing::level_filters::LevelFilter;
use tracing::{info, trace, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{SensoriumError, SensoriumResult};

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    Compact,
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = std::convert::Infallible;

    /// Unknown formats fall back to pretty.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        })
    }
}

/// Map a configured level name onto a filter, defaulting to INFO.
pub fn level_filter(level: &str) -> LevelFilter {
    LevelFilter::from_str(level.trim()).unwrap_or(LevelFilter::INFO)
}

/// Install the global subscriber. `RUST_LOG` directives take precedence over
/// the configured level.
pub fn init_logging(config: &LoggingConfig) -> SensoriumResult<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter(&config.level).into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(env_filter);
    let format = LogFormat::from_str(&config.format).unwrap_or_default();

    let installed = match format {
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_file(config.source_location)
                    .with_line_number(config.source_location)
                    .with_thread_names(true),
            ),
        ),
        LogFormat::Compact => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().compact().with_ansi(config.colors).with_target(true)),
        ),
        LogFormat::Pretty => tracing::subscriber::set_global_default(
            registry.with(
                fmt::layer()
                    .pretty()
                    .with_ansi(config.colors)
                    .with_target(true)
                    .with_file(config.source_location)
                    .with_line_number(config.source_location),
            ),
        ),
    };
    installed.map_err(|e| SensoriumError::Internal(format!("Failed to set logger: {}", e)))?;

    info!(
        target: "sensorium::init",
        level = %config.level,
        format = %config.format,
        "Logging initialized"
    );

    Ok(())
}

// ----------------------------------------------------------------------------
// Performance Timer
// ----------------------------------------------------------------------------

/// Times one operation and warns when it runs past a threshold.
pub struct PerfTimer {
    name: &'static str,
    start: Instant,
    threshold_ms: Option<u64>,
}

impl PerfTimer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
            threshold_ms: None,
        }
    }

    pub fn with_threshold(name: &'static str, threshold_ms: u64) -> Self {
        Self {
            threshold_ms: Some(threshold_ms),
            ..Self::new(name)
        }
    }

    pub fn elapsed_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    /// Stop the timer, logging if it exceeded its threshold. Returns elapsed
    /// microseconds.
    pub fn stop(self) -> u64 {
        let elapsed_us = self.elapsed_us();

        match self.threshold_ms {
            Some(threshold_ms) if elapsed_us > threshold_ms.saturating_mul(1000) => {
                warn!(
                    target: "sensorium::perf",
                    operation = self.name,
                    elapsed_us,
                    threshold_ms,
                    "Operation exceeded threshold"
                );
            }
            _ => {
                trace!(target: "sensorium::perf", operation = self.name, elapsed_us, "Operation completed");
            }
        }

        elapsed_us
    }
}
