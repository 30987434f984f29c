//! # Sensorium
//!
//! In-memory time-series store for periodic IoT sensor readings.
//!
//! Every registered metric keeps a bounded raw history, plus 1-minute and
//! 5-minute bucket aggregates folded in as writes arrive. Queries return raw
//! points or bucket averages over an optional inclusive range, and a small
//! statistics layer derives trailing-window percent changes.
//!
//! The [`api`] module exposes the store over HTTP for a dashboard; [`server`]
//! wires it to a listener with graceful shutdown.
//!
//! ```no_run
//! use sensorium::store::{MetricStore, Resolution, StoreSettings};
//! use sensorium::timestamp::Timestamp;
//!
//! let store = MetricStore::new(["voltage"], StoreSettings::default()).unwrap();
//! store.write("voltage", 230.5, Timestamp::from_secs(1_735_689_600));
//! let points = store.query("voltage", None, Resolution::Raw);
//! assert_eq!(points.len(), 1);
//! ```

pub mod api;
pub mod bucketer;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod ring_buffer;
pub mod server;
pub mod simulate;
pub mod stats;
pub mod store;
pub mod timestamp;

pub use config::SensoriumConfig;
pub use error::{SensoriumError, SensoriumResult};
pub use store::{MetricStore, Resolution, Sample, StoreSettings, TimeRange};
pub use timestamp::{Clock, ManualClock, SystemClock, Timestamp};
