//! Composition root.
//!
//! ```text
//!  device ──▶ DeviceReader ──▶ LatestValueCell ──┬─▶ logger ───▶ log sink
//!                                                ├─▶ alerts ───▶ alert channel
//!                                                ├─▶ broadcast ▶ outbound channel ─▶ network worker ─▶ net sink
//!                                                └─▶ heartbeat
//! ```
//!
//! One [`StopSignal`] is shared by the reader, the scheduler and both
//! channels, so a single trigger releases every thread the hub owns.

mod tasks;

pub use tasks::TaskSpec;

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use sensorhub_rt::{
    BoundedChannel, CapacityError, LatestValueCell, OverflowPolicy, Scheduler, SchedulerError,
    StopSignal, TaskStats,
};
use sensorhub_sinks::{FileLogSink, NullSink, SinkError, SnapshotSink, UdpBroadcastSink};
use sensorhub_types::{AlertEvent, SensorSnapshot};
use thiserror::Error;
use tracing::{error, info};

use crate::alert::AlertChecker;
use crate::config::HubConfig;
use crate::device::SensorDevice;
use crate::reader::{DeviceReader, ReaderStats};

/// Errors building or starting a [`Hub`].
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Invalid channel configuration: {0}")]
    Channel(#[from] CapacityError),

    #[error("Failed to open sink: {0}")]
    Sink(#[from] SinkError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Failed to spawn {what} thread: {source}")]
    Spawn {
        what: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Hub already started")]
    AlreadyStarted,

    #[error("Hub has been stopped")]
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HubState {
    Idle,
    Running,
    Stopped,
}

/// Collaborators held until `start()` hands them to their threads.
struct Parts {
    device: Box<dyn SensorDevice>,
    log_sink: Box<dyn SnapshotSink>,
    network_sink: Box<dyn SnapshotSink>,
}

/// The running sensor hub.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use sensorhub::device::ScriptedDevice;
/// use sensorhub::{Hub, HubConfig};
/// use sensorhub_sinks::NullSink;
/// use sensorhub_types::SensorSnapshot;
///
/// let device = ScriptedDevice::new([SensorSnapshot::new(31.0, 40.0, false, false, 1)]);
/// let mut hub = Hub::with_sinks(
///     HubConfig::default(),
///     Box::new(device),
///     Box::new(NullSink),
///     Box::new(NullSink),
/// )
/// .unwrap();
///
/// hub.start().unwrap();
/// std::thread::sleep(Duration::from_millis(100));
/// assert!(hub.cell().read().is_some());
/// hub.stop();
/// ```
pub struct Hub {
    config: HubConfig,
    stop: StopSignal,
    cell: Arc<LatestValueCell<SensorSnapshot>>,
    alerts: Arc<BoundedChannel<AlertEvent>>,
    outbound: Arc<BoundedChannel<SensorSnapshot>>,
    scheduler: Scheduler,
    parts: Option<Parts>,
    reader: Option<DeviceReader>,
    network: Option<JoinHandle<()>>,
    state: HubState,
}

impl Hub {
    /// Build a hub with sinks opened from `config`.
    ///
    /// The log file is opened (and created) here; the UDP sink is used only
    /// when `network.enabled` is set.
    pub fn new(config: HubConfig, device: Box<dyn SensorDevice>) -> Result<Self, HubError> {
        let log_sink = Box::new(FileLogSink::open(&config.log.path, config.log.format)?);
        let network_sink: Box<dyn SnapshotSink> = if config.network.enabled {
            Box::new(UdpBroadcastSink::new(&config.network.target)?)
        } else {
            Box::new(NullSink)
        };
        Self::with_sinks(config, device, log_sink, network_sink)
    }

    /// Build a hub around caller-provided sinks.
    pub fn with_sinks(
        config: HubConfig,
        device: Box<dyn SensorDevice>,
        log_sink: Box<dyn SnapshotSink>,
        network_sink: Box<dyn SnapshotSink>,
    ) -> Result<Self, HubError> {
        let stop = StopSignal::new();
        let alerts = Arc::new(BoundedChannel::new(
            config.channel.alert_capacity,
            OverflowPolicy::Overwrite,
        )?);
        let outbound = Arc::new(BoundedChannel::new(
            config.channel.broadcast_capacity,
            OverflowPolicy::Overwrite,
        )?);
        let scheduler = Scheduler::with_stop_signal(stop.clone())
            .overrun_policy(config.scheduler.overrun_policy);

        Ok(Self {
            config,
            stop,
            cell: Arc::new(LatestValueCell::new()),
            alerts,
            outbound,
            scheduler,
            parts: Some(Parts {
                device,
                log_sink,
                network_sink,
            }),
            reader: None,
            network: None,
            state: HubState::Idle,
        })
    }

    /// Start the device reader, the network worker and the periodic tasks.
    ///
    /// On failure everything already started is stopped again.
    pub fn start(&mut self) -> Result<(), HubError> {
        match self.state {
            HubState::Idle => {}
            HubState::Running => return Err(HubError::AlreadyStarted),
            HubState::Stopped => return Err(HubError::Stopped),
        }
        let parts = self.parts.take().ok_or(HubError::Stopped)?;
        self.state = HubState::Running;

        if let Err(e) = self.launch(parts) {
            error!("Hub failed to start: {}", e);
            self.stop();
            return Err(e);
        }

        info!(
            "Hub running: {} tasks, log -> {}, network {}",
            self.scheduler.stats().len(),
            self.config.log.path.display(),
            if self.config.network.enabled {
                self.config.network.target.as_str()
            } else {
                "disabled"
            }
        );
        Ok(())
    }

    fn launch(&mut self, parts: Parts) -> Result<(), HubError> {
        self.alerts.close_on(&self.stop);
        self.outbound.close_on(&self.stop);

        let reader = DeviceReader::spawn(
            parts.device,
            self.cell.clone(),
            self.stop.clone(),
            self.config.reader,
        )
        .map_err(|source| HubError::Spawn {
            what: "device reader",
            source,
        })?;
        let reader_stats = reader.stats_handle();
        self.reader = Some(reader);

        let outbound = self.outbound.clone();
        let network_sink = parts.network_sink;
        let network = thread::Builder::new()
            .name("network".to_string())
            .spawn(move || tasks::network_worker(outbound, network_sink))
            .map_err(|source| HubError::Spawn {
                what: "network worker",
                source,
            })?;
        self.network = Some(network);

        let specs = &self.config.tasks;
        self.scheduler
            .add(tasks::logger(specs.logger(), self.cell.clone(), parts.log_sink))?;
        self.scheduler.add(tasks::alerts(
            specs.alerts(),
            self.cell.clone(),
            AlertChecker::new(self.config.alerts),
            self.alerts.clone(),
        ))?;
        self.scheduler.add(tasks::broadcast(
            specs.broadcast(),
            self.cell.clone(),
            self.outbound.clone(),
        ))?;
        self.scheduler.add(tasks::heartbeat(
            specs.heartbeat(),
            self.cell.clone(),
            reader_stats,
        ))?;

        self.scheduler.start()?;
        Ok(())
    }

    /// Stop everything in reverse dependency order: periodic tasks, then the
    /// network worker, then the device reader.
    ///
    /// Idempotent. Stopping a hub that never started does nothing; it can
    /// still be started afterwards.
    pub fn stop(&mut self) {
        if self.state != HubState::Running {
            return;
        }
        self.state = HubState::Stopped;

        self.scheduler.stop();
        self.stop.trigger();

        if let Some(network) = self.network.take() {
            if network.join().is_err() {
                error!("Network worker panicked");
            }
        }
        if let Some(reader) = self.reader.as_mut() {
            reader.stop();
        }
        self.parts = None;

        info!("Hub stopped");
    }

    pub fn is_running(&self) -> bool {
        self.state == HubState::Running
    }

    /// The freshest reading.
    pub fn cell(&self) -> Arc<LatestValueCell<SensorSnapshot>> {
        self.cell.clone()
    }

    /// Alert events raised by the alert task. Oldest events are dropped
    /// when nobody drains the channel.
    pub fn alerts(&self) -> Arc<BoundedChannel<AlertEvent>> {
        self.alerts.clone()
    }

    /// Triggering this signal from anywhere shuts the hub's threads down;
    /// call [`stop`](Self::stop) afterwards to join them.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn task_stats(&self) -> Vec<TaskStats> {
        self.scheduler.stats()
    }

    /// `None` until the reader has been started.
    pub fn reader_stats(&self) -> Option<ReaderStats> {
        self.reader.as_ref().map(DeviceReader::stats)
    }
}

impl Drop for Hub {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("state", &self.state)
            .field("sequence", &self.cell.sequence())
            .finish_non_exhaustive()
    }
}
