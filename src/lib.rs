//! # sensorhub
//!
//! A soft real-time sensor hub. A background thread polls a sensor device and
//! publishes each reading into a latest-value cell; periodic tasks log,
//! check and broadcast the freshest reading at their own pace without ever
//! blocking the reader or each other.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                                Hub                                 │
//! │  ┌────────┐    ┌──────────────┐    ┌─────────────────┐             │
//! │  │ device │───▶│ DeviceReader │───▶│ LatestValueCell │             │
//! │  └────────┘    └──────────────┘    └────────┬────────┘             │
//! │                                             │ read                 │
//! │                 ┌───────────────────────────┼─────────────────┐    │
//! │                 ▼                           ▼                 ▼    │
//! │          logger 0.5Hz               alerts 0.2Hz       broadcast 1Hz│
//! │                 │                           │                 │    │
//! │                 ▼                           ▼                 ▼    │
//! │             log sink                 alert channel     outbound    │
//! │                                                         channel    │
//! │                                                          │         │
//! │                                                   network worker   │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`device`]**: the [`SensorDevice`] trait with character-device,
//!   simulated, replay and scripted implementations
//! - **[`reader`]**: [`DeviceReader`], the polling thread with backoff and
//!   timestamp clamping
//! - **[`alert`]**: [`AlertChecker`], strict greater-than threshold checks
//! - **[`hub`]**: [`Hub`], which wires everything to a
//!   [`Scheduler`](sensorhub_rt::Scheduler) and shuts it down in order
//! - **[`config`]**: [`HubConfig`], layered from defaults, TOML and
//!   `SENSORHUB_*` environment variables
//!
//! The concurrency primitives live in `sensorhub-rt`, the data types in
//! `sensorhub-types`, and the output sinks in `sensorhub-sinks`.
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Read the kernel driver at /dev/sensorhub
//! sensorhub
//!
//! # No hardware: simulated readings every 500ms, for ten seconds
//! sensorhub --device simulated --sample-interval 500ms --duration 10s
//!
//! # Replay a recorded session and broadcast it on the LAN
//! sensorhub --device replay --device-path session.jsonl --broadcast 255.255.255.255:5005
//! ```
//!
//! ### As a library
//!
//! ```no_run
//! use sensorhub::{device, Hub, HubConfig};
//!
//! let config = HubConfig::load(None).unwrap();
//! let device = device::open(&config.device).unwrap();
//! let mut hub = Hub::new(config, device).unwrap();
//!
//! hub.start().unwrap();
//! hub.stop_signal().wait();
//! hub.stop();
//! ```

pub mod alert;
pub mod config;
pub mod device;
pub mod hub;
pub mod reader;

pub use alert::AlertChecker;
pub use config::{ConfigError, HubConfig};
pub use device::{DeviceError, SensorDevice};
pub use hub::{Hub, HubError, TaskSpec};
pub use reader::{DeviceReader, ReaderConfig, ReaderStats};
