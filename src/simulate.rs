// ============================================================================
// PAYLOAD SIMULATOR
// ============================================================================
// Posts synthetic gateway payloads to a running ingest endpoint at a fixed
// interval. Useful for populating a dashboard without hardware attached.
// ============================================================================

use std::ops::Range;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reqwest::Client as HttpClient;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::constants::{DEFAULT_SIMULATE_INTERVAL_MS, DEFAULT_SIMULATE_URL};
use crate::error::{SensoriumError, SensoriumResult};
use crate::ingest::{EnergyMeterReadings, IngestPayload, TemperatureReadings, VibrationReadings};
use crate::server::shutdown_signal;
use crate::timestamp::Timestamp;

const TEMP_CH1: Range<f64> = 25.0..40.0;
const TEMP_CH3: Range<f64> = 24.0..40.0;
const TEMP_CH5: Range<f64> = 23.0..40.0;
const ENERGY_KWH: Range<f64> = 15.0..25.0;
const FREQUENCY_HZ: Range<f64> = 50.0..52.0;
const VOLTAGE_V: Range<f64> = 220.0..240.0;
const VIBRATION_V: Range<f64> = 2.0..4.0;

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub url: String,
    pub interval: Duration,
    /// Stop after this many payloads; run until Ctrl-C when unset
    pub count: Option<u64>,
    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SIMULATE_URL.into(),
            interval: Duration::from_millis(DEFAULT_SIMULATE_INTERVAL_MS),
            count: None,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulationSummary {
    pub sent: u64,
    pub failed: u64,
}

/// Generates realistic sensor readings.
pub struct PayloadGenerator {
    rng: StdRng,
}

impl PayloadGenerator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    fn reading(&mut self, range: Range<f64>) -> f64 {
        (self.rng.gen_range(range) * 100.0).round() / 100.0
    }

    /// A full payload stamped with `at` in UTC.
    pub fn next_payload(&mut self, at: Timestamp) -> IngestPayload {
        IngestPayload {
            temperature: Some(TemperatureReadings {
                ch1: Some(self.reading(TEMP_CH1)),
                ch3: Some(self.reading(TEMP_CH3)),
                ch5: Some(self.reading(TEMP_CH5)),
            }),
            energy_meter: Some(EnergyMeterReadings {
                energy_kwh: Some(self.reading(ENERGY_KWH)),
                frequency_hz: Some(self.reading(FREQUENCY_HZ)),
                voltage_v: Some(self.reading(VOLTAGE_V)),
                current_a: None,
            }),
            vibrator_meter: Some(VibrationReadings {
                s4_voltage: Some(self.reading(VIBRATION_V)),
            }),
            timestamp: Some(at.to_rfc3339()),
        }
    }
}

pub struct Simulator {
    client: HttpClient,
    config: SimulatorConfig,
    generator: PayloadGenerator,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> SensoriumResult<Self> {
        let client = HttpClient::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SensoriumError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            generator: PayloadGenerator::new(config.seed),
            config,
        })
    }

    async fn send(&mut self) -> bool {
        let payload = self.generator.next_payload(Timestamp::now());

        match self.client.post(&self.config.url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                let body = response.text().await.unwrap_or_default();
                info!(target: "sensorium::simulate", response = %body, "Payload accepted");
                true
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                warn!(target: "sensorium::simulate", %status, response = %body, "Payload rejected");
                false
            }
            Err(e) => {
                warn!(target: "sensorium::simulate", error = %e, "Network error");
                false
            }
        }
    }

    /// Post payloads until `count` is reached or Ctrl-C. The first payload is
    /// sent immediately.
    pub async fn run(mut self) -> SimulationSummary {
        info!(
            target: "sensorium::simulate",
            url = %self.config.url,
            interval_ms = self.config.interval.as_millis() as u64,
            count = ?self.config.count,
            "Starting payload simulation"
        );

        let mut summary = SimulationSummary::default();
        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let stop = shutdown_signal();
        tokio::pin!(stop);

        loop {
            if self.config.count.is_some_and(|count| summary.sent + summary.failed >= count) {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    if self.send().await {
                        summary.sent += 1;
                    } else {
                        summary.failed += 1;
                    }
                }
                _ = &mut stop => break,
            }
        }

        info!(
            target: "sensorium::simulate",
            sent = summary.sent,
            failed = summary.failed,
            "Simulation finished"
        );
        summary
    }
}
