// ============================================================================
// INGEST
// ============================================================================
// Inbound sensor payloads:
// - Wire model for the gateway JSON body
// - Timestamp parsing (RFC 3339, or local `YYYY-MM-DD HH:mm:ss` in a fixed offset)
// - Flattening into (metric key, value) pairs written under one timestamp
// ============================================================================

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, IngestError, QueryError};
use crate::store::MetricStore;
use crate::timestamp::Timestamp;

static LOCAL_TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}$").expect("local timestamp pattern is valid")
});

static OFFSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([+-])(\d{2}):(\d{2})$").expect("offset pattern is valid"));

const LOCAL_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ----------------------------------------------------------------------------
// Payload Model
// ----------------------------------------------------------------------------

/// Body of `POST /api/ingest`. Every group and reading is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<TemperatureReadings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_meter: Option<EnergyMeterReadings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vibrator_meter: Option<VibrationReadings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemperatureReadings {
    #[serde(rename = "CH1", default, skip_serializing_if = "Option::is_none")]
    pub ch1: Option<f64>,
    #[serde(rename = "CH3", default, skip_serializing_if = "Option::is_none")]
    pub ch3: Option<f64>,
    #[serde(rename = "CH5", default, skip_serializing_if = "Option::is_none")]
    pub ch5: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyMeterReadings {
    #[serde(rename = "energy_kWh", default, skip_serializing_if = "Option::is_none")]
    pub energy_kwh: Option<f64>,
    #[serde(rename = "frequency_Hz", default, skip_serializing_if = "Option::is_none")]
    pub frequency_hz: Option<f64>,
    #[serde(rename = "voltage_V", default, skip_serializing_if = "Option::is_none")]
    pub voltage_v: Option<f64>,
    #[serde(rename = "current_A", default, skip_serializing_if = "Option::is_none")]
    pub current_a: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VibrationReadings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s4_voltage: Option<f64>,
}

impl IngestPayload {
    /// Present readings, keyed by store metric key.
    pub fn readings(&self) -> Vec<(&'static str, f64)> {
        let energy = self.energy_meter.as_ref();
        let temperature = self.temperature.as_ref();

        [
            ("voltage", energy.and_then(|e| e.voltage_v)),
            ("frequency_Hz", energy.and_then(|e| e.frequency_hz)),
            ("energy_kWh", energy.and_then(|e| e.energy_kwh)),
            ("temp.CH1", temperature.and_then(|t| t.ch1)),
            ("temp.CH3", temperature.and_then(|t| t.ch3)),
            ("temp.CH5", temperature.and_then(|t| t.ch5)),
            ("vibration", self.vibrator_meter.as_ref().and_then(|v| v.s4_voltage)),
            ("current_A", energy.and_then(|e| e.current_a)),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect()
    }

    /// Example body shown by `GET /api/ingest`.
    pub fn example() -> Self {
        Self {
            temperature: Some(TemperatureReadings {
                ch1: Some(32.0),
                ch3: Some(31.0),
                ch5: Some(31.05),
            }),
            energy_meter: Some(EnergyMeterReadings {
                energy_kwh: Some(17.39),
                frequency_hz: Some(50.02),
                voltage_v: Some(230.4),
                current_a: None,
            }),
            vibrator_meter: Some(VibrationReadings {
                s4_voltage: Some(2.9588),
            }),
            timestamp: Some("2025-09-25 09:54:39".into()),
        }
    }
}

// ----------------------------------------------------------------------------
// Timestamp Parsing
// ----------------------------------------------------------------------------

/// Parse a `±HH:MM` UTC offset.
pub fn parse_offset(raw: &str) -> Result<FixedOffset, ConfigError> {
    let invalid = || {
        ConfigError::invalid_value(
            "ingest.local_offset",
            format!("'{}' is not a ±HH:MM offset", raw),
        )
    };

    let caps = OFFSET.captures(raw.trim()).ok_or_else(invalid)?;
    let hours: i32 = caps[2].parse().map_err(|_| invalid())?;
    let minutes: i32 = caps[3].parse().map_err(|_| invalid())?;
    if minutes >= 60 {
        return Err(invalid());
    }

    let seconds = (hours * 3600 + minutes * 60) * if &caps[1] == "-" { -1 } else { 1 };
    FixedOffset::east_opt(seconds).ok_or_else(invalid)
}

/// Parse an ingest timestamp.
///
/// `YYYY-MM-DD HH:mm:ss` is read as wall-clock time in `local_offset`;
/// anything else must be RFC 3339.
pub fn parse_timestamp(raw: &str, local_offset: FixedOffset) -> Result<Timestamp, IngestError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(IngestError::MissingTimestamp);
    }

    let invalid = || IngestError::InvalidTimestamp { raw: raw.to_string() };

    if LOCAL_TIMESTAMP.is_match(raw) {
        let naive = NaiveDateTime::parse_from_str(raw, LOCAL_TIMESTAMP_FORMAT).map_err(|_| invalid())?;
        let local = local_offset.from_local_datetime(&naive).single().ok_or_else(invalid)?;
        return Ok(Timestamp::from_millis(local.timestamp_millis()));
    }

    DateTime::parse_from_rfc3339(raw)
        .map(|dt| Timestamp::from_millis(dt.timestamp_millis()))
        .map_err(|_| invalid())
}

/// Parse a query bound (`from` / `to`). RFC 3339 only.
pub fn parse_iso(raw: &str) -> Result<Timestamp, QueryError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| Timestamp::from_millis(dt.timestamp_millis()))
        .map_err(|_| QueryError::InvalidDateRange { raw: raw.to_string() })
}

// ----------------------------------------------------------------------------
// Ingestion
// ----------------------------------------------------------------------------

/// Outcome of a successful ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReceipt {
    pub timestamp: Timestamp,
    /// Readings present in the payload
    pub metrics_stored: usize,
}

/// Validate `payload` and write each present reading under its timestamp.
pub fn ingest(
    store: &MetricStore,
    payload: &IngestPayload,
    local_offset: FixedOffset,
) -> Result<IngestReceipt, IngestError> {
    let raw = payload.timestamp.as_deref().ok_or(IngestError::MissingTimestamp)?;
    let timestamp = parse_timestamp(raw, local_offset)?;

    let readings = payload.readings();
    for (key, value) in &readings {
        store.write(key, *value, timestamp);
    }

    debug!(
        target: "sensorium::ingest",
        timestamp = %timestamp,
        readings = readings.len(),
        "Payload ingested"
    );

    Ok(IngestReceipt {
        timestamp,
        metrics_stored: readings.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Resolution, StoreSettings};
    use pretty_assertions::assert_eq;

    fn ist() -> FixedOffset {
        parse_offset("+05:30").unwrap()
    }

    #[test]
    fn test_parse_offset() {
        assert_eq!(parse_offset("+05:30").unwrap().local_minus_utc(), 19_800);
        assert_eq!(parse_offset("-03:00").unwrap().local_minus_utc(), -10_800);
        assert_eq!(parse_offset("+00:00").unwrap().local_minus_utc(), 0);
        assert!(parse_offset("IST").is_err());
        assert!(parse_offset("+5:30").is_err());
        assert!(parse_offset("+05:75").is_err());
    }

    #[test]
    fn test_local_format_uses_offset() {
        let ts = parse_timestamp("2025-09-25 09:54:39", ist()).unwrap();
        assert_eq!(ts.to_rfc3339(), "2025-09-25T04:24:39.000Z");

        let utc = parse_timestamp("2025-09-25 09:54:39", parse_offset("+00:00").unwrap()).unwrap();
        assert_eq!(utc.to_rfc3339(), "2025-09-25T09:54:39.000Z");
    }

    #[test]
    fn test_rfc3339_with_offsets() {
        let z = parse_timestamp("2025-01-01T00:00:00Z", ist()).unwrap();
        assert_eq!(z, Timestamp::from_secs(1_735_689_600));

        let shifted = parse_timestamp("2025-01-01T05:30:00+05:30", ist()).unwrap();
        assert_eq!(shifted, z);

        let millis = parse_timestamp("2025-01-01T00:00:00.250Z", ist()).unwrap();
        assert_eq!(millis.as_millis(), z.as_millis() + 250);
    }

    #[test]
    fn test_rejects_garbage() {
        for raw in ["yesterday", "2025-13-01 00:00:00", "2025-01-01", "1735689600"] {
            assert_eq!(
                parse_timestamp(raw, ist()),
                Err(IngestError::InvalidTimestamp { raw: raw.to_string() }),
                "{raw}"
            );
        }
        assert_eq!(parse_timestamp("  ", ist()), Err(IngestError::MissingTimestamp));
    }

    #[test]
    fn test_parse_iso() {
        assert_eq!(
            parse_iso("2025-01-01T00:00:05Z").unwrap(),
            Timestamp::from_secs(1_735_689_605)
        );
        assert!(matches!(parse_iso("not-a-date"), Err(QueryError::InvalidDateRange { .. })));
    }

    #[test]
    fn test_readings_skip_absent_fields() {
        let payload: IngestPayload = serde_json::from_str(
            r#"{
                "temperature": {"CH1": 32.0, "CH3": null},
                "energy_meter": {"voltage_V": 230.5, "current_A": 4.2},
                "timestamp": "2025-01-01T00:00:00Z"
            }"#,
        )
        .unwrap();

        assert_eq!(
            payload.readings(),
            vec![("voltage", 230.5), ("temp.CH1", 32.0), ("current_A", 4.2)]
        );
    }

    #[test]
    fn test_ingest_writes_every_reading() {
        let store = MetricStore::new(
            crate::constants::DEFAULT_METRIC_KEYS,
            StoreSettings::default(),
        )
        .unwrap();

        let receipt = ingest(&store, &IngestPayload::example(), ist()).unwrap();

        assert_eq!(receipt.metrics_stored, 7);
        assert_eq!(receipt.timestamp.to_rfc3339(), "2025-09-25T04:24:39.000Z");
        assert_eq!(store.latest("temp.CH5"), Some(31.05));
        assert_eq!(store.latest("vibration"), Some(2.9588));
        assert_eq!(store.query("voltage", None, Resolution::Raw).len(), 1);
    }

    #[test]
    fn test_ingest_without_timestamp_writes_nothing() {
        let store = MetricStore::new(["voltage"], StoreSettings::default()).unwrap();
        let payload = IngestPayload {
            timestamp: None,
            ..IngestPayload::example()
        };

        assert_eq!(ingest(&store, &payload, ist()), Err(IngestError::MissingTimestamp));
        assert!(store.latest_snapshot().is_empty());
    }
}
