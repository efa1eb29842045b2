//! Device channel abstraction.
//!
//! A [`SensorDevice`] is anything that can hand out one [`SensorSnapshot`]
//! at a time without blocking: the kernel character device on a Pi, a
//! simulated sensor, a recorded session, or a scripted fake in tests.
//!
//! Each call to [`SensorDevice::try_read`] has three outcomes:
//!
//! - `Ok(Some(snapshot))`: a new sample.
//! - `Ok(None)`: no data yet. Transient; the caller backs off and retries.
//! - `Err(_)`: the device misbehaved. The caller logs it and retries later.

#[cfg(unix)]
mod chardev;
mod replay;
mod scripted;
mod simulated;

#[cfg(unix)]
pub use chardev::{CharDevice, DEFAULT_DEVICE_PATH};
pub use replay::{ReplayDevice, DEFAULT_REPLAY_INTERVAL};
pub use scripted::{ScriptedDevice, ScriptedRead};
pub use simulated::{SimulatedConfig, SimulatedDevice};

use sensorhub_types::{RecordError, SensorSnapshot};
use thiserror::Error;

use crate::config::{DeviceConfig, DeviceKind};

/// Errors reported by a device channel.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device could not be opened.
    #[error("Failed to open device {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A read or control call failed.
    #[error("Device I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device returned a record of the wrong shape.
    #[error("Malformed record: {0}")]
    Record(#[from] RecordError),

    /// A replayed or scripted line could not be parsed.
    #[error("Failed to parse sample: {0}")]
    Parse(String),
}

/// A source of sensor samples.
///
/// Implementations must not block in [`try_read`](Self::try_read); waiting
/// between samples is the reader's job.
pub trait SensorDevice: Send {
    /// Fetch the next sample if one is ready.
    fn try_read(&mut self) -> Result<Option<SensorSnapshot>, DeviceError>;

    /// Clear any pending "data ready" state.
    fn reset(&mut self) -> Result<(), DeviceError>;

    /// Human-readable description, used in logs.
    fn description(&self) -> &str;
}

impl<D: SensorDevice + ?Sized> SensorDevice for Box<D> {
    fn try_read(&mut self) -> Result<Option<SensorSnapshot>, DeviceError> {
        (**self).try_read()
    }

    fn reset(&mut self) -> Result<(), DeviceError> {
        (**self).reset()
    }

    fn description(&self) -> &str {
        (**self).description()
    }
}

/// Open the device described by `config`.
///
/// For the character device this is where a missing driver shows up.
pub fn open(config: &DeviceConfig) -> Result<Box<dyn SensorDevice>, DeviceError> {
    match config.kind {
        #[cfg(unix)]
        DeviceKind::Char => Ok(Box::new(CharDevice::open(&config.path)?)),
        #[cfg(not(unix))]
        DeviceKind::Char => Err(DeviceError::Open {
            path: config.path.display().to_string(),
            source: std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "character devices are only supported on unix",
            ),
        }),
        DeviceKind::Simulated => Ok(Box::new(SimulatedDevice::new(config.simulated.clone()))),
        DeviceKind::Replay => Ok(Box::new(
            ReplayDevice::open(&config.path, config.looping)?.paced(config.replay_interval),
        )),
    }
}
