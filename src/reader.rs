//! Background device reader.
//!
//! A [`DeviceReader`] owns one [`SensorDevice`] and a dedicated thread that
//! polls it, publishing every sample into a shared [`LatestValueCell`].
//! Transient "no data" results and device errors are absorbed here: the
//! reader backs off and retries, so the hub keeps running with a flaky or
//! disconnected sensor.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use sensorhub_rt::{LatestValueCell, StopSignal};
use sensorhub_types::SensorSnapshot;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::config::duration;
use crate::device::SensorDevice;

/// Backoff intervals for [`DeviceReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Wait after a "no data yet" result.
    #[serde(deserialize_with = "duration::deserialize")]
    pub idle_backoff: Duration,
    /// Wait after a device error.
    #[serde(deserialize_with = "duration::deserialize")]
    pub error_backoff: Duration,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            idle_backoff: Duration::from_millis(50),
            error_backoff: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Default)]
struct ReaderCounters {
    samples: AtomicU64,
    idle_polls: AtomicU64,
    device_errors: AtomicU64,
    clamped_timestamps: AtomicU64,
}

/// Counters reported by [`DeviceReader::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    /// Samples published to the cell.
    pub samples: u64,
    /// Polls that found no data.
    pub idle_polls: u64,
    /// Polls that failed with a device error.
    pub device_errors: u64,
    /// Samples whose timestamp was raised to keep the sequence monotonic.
    pub clamped_timestamps: u64,
}

/// Cheap clonable view of a running reader's counters.
#[derive(Debug, Clone)]
pub struct ReaderStatsHandle(Arc<ReaderCounters>);

impl ReaderStatsHandle {
    pub fn get(&self) -> ReaderStats {
        self.0.snapshot()
    }
}

impl ReaderCounters {
    fn snapshot(&self) -> ReaderStats {
        ReaderStats {
            samples: self.samples.load(Ordering::Relaxed),
            idle_polls: self.idle_polls.load(Ordering::Relaxed),
            device_errors: self.device_errors.load(Ordering::Relaxed),
            clamped_timestamps: self.clamped_timestamps.load(Ordering::Relaxed),
        }
    }
}

/// Handle to the device polling thread.
///
/// Dropping the handle stops and joins the thread.
#[derive(Debug)]
pub struct DeviceReader {
    handle: Option<JoinHandle<()>>,
    stop: StopSignal,
    counters: Arc<ReaderCounters>,
}

impl DeviceReader {
    /// Start polling `device` on a new thread named `device-reader`.
    ///
    /// The thread runs until `stop` is triggered.
    pub fn spawn<D>(
        device: D,
        cell: Arc<LatestValueCell<SensorSnapshot>>,
        stop: StopSignal,
        config: ReaderConfig,
    ) -> io::Result<Self>
    where
        D: SensorDevice + 'static,
    {
        let counters = Arc::new(ReaderCounters::default());
        let worker = ReaderLoop {
            device,
            cell,
            stop: stop.clone(),
            config,
            counters: counters.clone(),
            last_timestamp: None,
            failing: false,
        };
        let handle = thread::Builder::new()
            .name("device-reader".to_string())
            .spawn(move || worker.run())?;

        Ok(Self {
            handle: Some(handle),
            stop,
            counters,
        })
    }

    pub fn stats(&self) -> ReaderStats {
        self.counters.snapshot()
    }

    /// Counters that stay readable from other threads.
    pub fn stats_handle(&self) -> ReaderStatsHandle {
        ReaderStatsHandle(self.counters.clone())
    }

    /// Whether the polling thread is still alive.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Trigger the shared stop signal and wait for the thread to exit.
    pub fn stop(&mut self) {
        self.stop.trigger();
        self.join();
    }

    /// Wait for the thread to exit without requesting a stop.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Device reader thread panicked");
            }
        }
    }
}

impl Drop for DeviceReader {
    fn drop(&mut self) {
        self.stop();
    }
}

struct ReaderLoop<D> {
    device: D,
    cell: Arc<LatestValueCell<SensorSnapshot>>,
    stop: StopSignal,
    config: ReaderConfig,
    counters: Arc<ReaderCounters>,
    last_timestamp: Option<u64>,
    /// Inside a run of consecutive device errors.
    failing: bool,
}

impl<D: SensorDevice> ReaderLoop<D> {
    fn run(mut self) {
        let description = self.device.description().to_string();
        info!("Device reader started on {}", description);

        if let Err(e) = self.device.reset() {
            warn!("Failed to reset {}: {}", description, e);
        }

        while !self.stop.is_triggered() {
            let backoff = match self.device.try_read() {
                Ok(Some(snapshot)) => {
                    self.publish(snapshot);
                    if self.failing {
                        info!("Device {} recovered", description);
                        self.failing = false;
                    }
                    continue;
                }
                Ok(None) => {
                    self.counters.idle_polls.fetch_add(1, Ordering::Relaxed);
                    self.config.idle_backoff
                }
                Err(e) => {
                    self.counters.device_errors.fetch_add(1, Ordering::Relaxed);
                    if self.failing {
                        debug!("Device {} still failing: {}", description, e);
                    } else {
                        error!("Failed to read from {}: {}", description, e);
                        self.failing = true;
                    }
                    self.config.error_backoff
                }
            };

            if self.stop.wait_timeout(backoff) {
                break;
            }
        }

        info!("Device reader stopped");
    }

    fn publish(&mut self, mut snapshot: SensorSnapshot) {
        if let Some(previous) = self.last_timestamp {
            if snapshot.timestamp_ms < previous {
                debug!(
                    "Device timestamp went backwards ({} < {}), clamping",
                    snapshot.timestamp_ms, previous
                );
                snapshot.timestamp_ms = previous;
                self.counters
                    .clamped_timestamps
                    .fetch_add(1, Ordering::Relaxed);
            }
        }
        self.last_timestamp = Some(snapshot.timestamp_ms);
        self.cell.publish(snapshot);
        self.counters.samples.fetch_add(1, Ordering::Relaxed);
    }
}
