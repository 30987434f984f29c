// ============================================================================
// COMMAND LINE INTERFACE
// ============================================================================

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::config::{LoggingConfig, SensoriumConfig};
use crate::constants::*;
use crate::error::{SensoriumError, SensoriumResult};
use crate::simulate::{Simulator, SimulatorConfig};

/// Sensorium CLI
#[derive(Parser, Debug)]
#[command(
    name = "sensorium",
    version,
    about = "In-memory IoT sensor metrics store with a dashboard API",
    long_about = "Sensorium ingests periodic sensor readings over HTTP, keeps a bounded \
                  rolling history per metric, folds it into 1-minute and 5-minute \
                  aggregates, and serves windowed queries to a dashboard."
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "sensorium.toml", env = "SENSORIUM_CONFIG")]
    pub config: PathBuf,

    /// Log level override
    #[arg(short, long, env = "SENSORIUM_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Subcommand to run (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Start the HTTP server
    Run,

    /// Validate configuration file
    Validate {
        /// Print the fully resolved configuration
        #[arg(short, long)]
        verbose: bool,
    },

    /// Generate default configuration file
    GenerateConfig {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show version and build info
    Version,

    /// Post synthetic sensor payloads to a running server
    Simulate {
        /// Ingest endpoint
        #[arg(short, long, default_value = DEFAULT_SIMULATE_URL)]
        url: String,

        /// Milliseconds between payloads
        #[arg(short, long, default_value_t = DEFAULT_SIMULATE_INTERVAL_MS)]
        interval_ms: u64,

        /// Stop after this many payloads
        #[arg(short = 'n', long)]
        count: Option<u64>,

        /// RNG seed for reproducible readings
        #[arg(long)]
        seed: Option<u64>,
    },
}

impl Cli {
    /// Logging settings with CLI overrides applied.
    pub fn logging_overrides(&self, base: &LoggingConfig) -> LoggingConfig {
        let mut logging = base.clone();
        if let Some(level) = &self.log_level {
            logging.level = level.clone();
        }
        if self.debug {
            logging.level = "debug".into();
        }
        logging
    }
}

/// Load the config file if present, otherwise defaults plus environment.
pub fn load_config(path: &Path) -> SensoriumResult<(SensoriumConfig, bool)> {
    if path.exists() {
        Ok((SensoriumConfig::load(path)?, true))
    } else {
        Ok((SensoriumConfig::from_env()?, false))
    }
}

pub fn handle_validate(config_path: &Path, verbose: bool) -> SensoriumResult<()> {
    println!("Validating configuration file: {}", config_path.display());

    let config = match SensoriumConfig::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            println!("Configuration validation failed: {}", e);
            return Err(SensoriumError::Config(e));
        }
    };

    println!("Configuration is valid.");
    if verbose {
        println!("\n{}", "=".repeat(60));
        match toml::to_string_pretty(&config) {
            Ok(s) => println!("{}", s),
            Err(e) => println!("Failed to serialize: {}", e),
        }
    }

    let storage = &config.storage;
    println!("\nSummary:");
    println!("  Listen address:      {}", config.server.address);
    println!("  Raw capacity:        {} samples per metric", storage.raw_capacity());
    println!("  Aggregated capacity: {} buckets per resolution", storage.aggregated_capacity);
    println!(
        "  Bucket widths:       {}s / {}s",
        storage.bucket_width_ms / 1000,
        storage.bucket_width_ms.saturating_mul(storage.coarse_bucket_factor) / 1000
    );
    println!("  Local offset:        {}", config.ingest.local_offset);
    println!("  Metrics ({}):        {}", storage.metrics.len(), storage.metrics.join(", "));

    Ok(())
}

pub fn handle_generate_config(output: Option<&Path>) -> SensoriumResult<()> {
    let rendered = SensoriumConfig::generate_default_config();

    match output {
        Some(path) => {
            fs::write(path, &rendered)?;
            println!("Default configuration written to: {}", path.display());
        }
        None => println!("{}", rendered),
    }

    Ok(())
}

pub fn handle_version() {
    println!("{} v{}", ENGINE_FULL_NAME, ENGINE_VERSION);
    println!();
    println!("  Target: {}-{}", std::env::consts::ARCH, std::env::consts::OS);
    println!("  Resolutions: raw, 1min, 5min");
    println!("  Default port: {}", DEFAULT_HTTP_PORT);
}

pub async fn handle_simulate(url: String, interval_ms: u64, count: Option<u64>, seed: Option<u64>) -> SensoriumResult<()> {
    if interval_ms == 0 {
        return Err(SensoriumError::Internal("--interval-ms must be greater than zero".into()));
    }

    let simulator = Simulator::new(SimulatorConfig {
        url,
        interval: Duration::from_millis(interval_ms),
        count,
        seed,
    })?;

    let summary = simulator.run().await;
    println!("Sent {} payloads ({} failed)", summary.sent, summary.failed);
    Ok(())
}
