//! Periodic task bodies run by the hub's scheduler.
//!
//! Every task reads the shared cell and acts only on snapshots it has not
//! seen yet, using the cell's sequence number, so a slow task never
//! processes the same reading twice and a fast one never blocks the reader.

use std::sync::Arc;

use sensorhub_rt::{BoundedChannel, LatestValueCell, PeriodicTask, RecvError, TaskPriority};
use sensorhub_sinks::SnapshotSink;
use sensorhub_types::{AlertEvent, SensorSnapshot};
use tracing::{debug, info, warn};

use crate::alert::AlertChecker;
use crate::reader::ReaderStatsHandle;

/// Rate and priority for one task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskSpec {
    pub rate_hz: f64,
    pub priority: TaskPriority,
}

/// Tracks the last cell sequence a task handled.
#[derive(Debug, Default)]
struct Cursor {
    seen: u64,
}

impl Cursor {
    fn next(&mut self, cell: &LatestValueCell<SensorSnapshot>) -> Option<SensorSnapshot> {
        let (snapshot, sequence) = cell.read_versioned()?;
        if sequence == self.seen {
            return None;
        }
        self.seen = sequence;
        Some(snapshot)
    }
}

/// Writes each new plausible reading to the log sink.
pub fn logger(
    spec: TaskSpec,
    cell: Arc<LatestValueCell<SensorSnapshot>>,
    mut sink: Box<dyn SnapshotSink>,
) -> PeriodicTask {
    let mut cursor = Cursor::default();
    PeriodicTask::new("logger", spec.rate_hz, move || {
        let Some(snapshot) = cursor.next(&cell) else {
            return Ok(());
        };
        if !snapshot.is_plausible() {
            debug!("Skipping implausible reading: {}", snapshot);
            return Ok(());
        }
        match sink.emit(&snapshot) {
            Ok(()) => info!("{}", snapshot),
            Err(e) => warn!("Failed to write to {} sink: {}", sink.name(), e),
        }
        Ok(())
    })
    .priority(spec.priority)
}

/// Checks each new reading against the thresholds and queues alert events.
pub fn alerts(
    spec: TaskSpec,
    cell: Arc<LatestValueCell<SensorSnapshot>>,
    checker: AlertChecker,
    events: Arc<BoundedChannel<AlertEvent>>,
) -> PeriodicTask {
    let mut cursor = Cursor::default();
    PeriodicTask::new("alerts", spec.rate_hz, move || {
        let Some(snapshot) = cursor.next(&cell) else {
            return Ok(());
        };
        for event in checker.events(&snapshot) {
            warn!("ALERT: {}", event.alert);
            // Closed only during shutdown
            if events.push(event).is_err() {
                debug!("Alert channel closed, dropping {}", event.alert.kind());
            }
        }
        Ok(())
    })
    .priority(spec.priority)
}

/// Hands each new reading to the network worker.
///
/// The outbound channel overwrites when full, so this never waits on the
/// network.
pub fn broadcast(
    spec: TaskSpec,
    cell: Arc<LatestValueCell<SensorSnapshot>>,
    outbound: Arc<BoundedChannel<SensorSnapshot>>,
) -> PeriodicTask {
    let mut cursor = Cursor::default();
    PeriodicTask::new("broadcast", spec.rate_hz, move || {
        if let Some(snapshot) = cursor.next(&cell) {
            if outbound.push(snapshot).is_err() {
                debug!("Outbound channel closed, dropping snapshot");
            }
        }
        Ok(())
    })
    .priority(spec.priority)
}

/// Liveness line with the current reading and reader counters.
pub fn heartbeat(
    spec: TaskSpec,
    cell: Arc<LatestValueCell<SensorSnapshot>>,
    reader: ReaderStatsHandle,
) -> PeriodicTask {
    let mut tick = true;
    PeriodicTask::new("heartbeat", spec.rate_hz, move || {
        let beat = if tick { "tick" } else { "tock" };
        tick = !tick;

        let stats = reader.get();
        match cell.read() {
            Some(snapshot) => debug!(
                "{} | {} | samples={} idle={} errors={}",
                beat, snapshot, stats.samples, stats.idle_polls, stats.device_errors
            ),
            None => debug!(
                "{} | no reading yet | idle={} errors={}",
                beat, stats.idle_polls, stats.device_errors
            ),
        }
        Ok(())
    })
    .priority(spec.priority)
}

/// Drains the outbound channel into the network sink until the channel is
/// closed and empty.
pub(crate) fn network_worker(
    outbound: Arc<BoundedChannel<SensorSnapshot>>,
    mut sink: Box<dyn SnapshotSink>,
) {
    info!("Network worker started ({} sink)", sink.name());
    loop {
        match outbound.pop() {
            Ok(snapshot) => match sink.emit(&snapshot) {
                Ok(()) => debug!("[NET] broadcast {}", snapshot),
                Err(e) => warn!("Broadcast via {} failed: {}", sink.name(), e),
            },
            Err(RecvError) => break,
        }
    }
    info!("Network worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensorhub_rt::OverflowPolicy;
    use sensorhub_sinks::SinkError;

    /// Records everything it is given.
    #[derive(Clone, Default)]
    struct Capture(Arc<parking_lot::Mutex<Vec<SensorSnapshot>>>);

    impl SnapshotSink for Capture {
        fn name(&self) -> &str {
            "capture"
        }

        fn emit(&mut self, snapshot: &SensorSnapshot) -> Result<(), SinkError> {
            self.0.lock().push(*snapshot);
            Ok(())
        }
    }

    struct Broken;

    impl SnapshotSink for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn emit(&mut self, _: &SensorSnapshot) -> Result<(), SinkError> {
            Err(SinkError::Io(std::io::Error::other("disk full")))
        }
    }

    fn spec() -> TaskSpec {
        TaskSpec {
            rate_hz: 1.0,
            priority: TaskPriority::BACKGROUND,
        }
    }

    fn reading(temperature: f32, ts: u64) -> SensorSnapshot {
        SensorSnapshot::new(temperature, 50.0, false, false, ts)
    }

    #[test]
    fn test_cursor_yields_each_publish_once() {
        let cell = LatestValueCell::new();
        let mut cursor = Cursor::default();
        assert_eq!(cursor.next(&cell), None);

        cell.publish(reading(20.0, 1));
        assert_eq!(cursor.next(&cell), Some(reading(20.0, 1)));
        assert_eq!(cursor.next(&cell), None);

        // Identical value published again is still a new reading
        cell.publish(reading(20.0, 1));
        assert!(cursor.next(&cell).is_some());
    }

    #[test]
    fn test_logger_skips_repeats_and_implausible_readings() {
        let cell = Arc::new(LatestValueCell::new());
        let capture = Capture::default();
        let mut task = logger(spec(), cell.clone(), Box::new(capture.clone()));

        task.run_once().unwrap();
        cell.publish(reading(22.0, 1));
        task.run_once().unwrap();
        task.run_once().unwrap();
        cell.publish(reading(-45.0, 2));
        task.run_once().unwrap();

        assert_eq!(*capture.0.lock(), vec![reading(22.0, 1)]);
    }

    #[test]
    fn test_logger_survives_sink_failure() {
        let cell = Arc::new(LatestValueCell::new());
        cell.publish(reading(22.0, 1));
        let mut task = logger(spec(), cell, Box::new(Broken));
        assert!(task.run_once().is_ok());
    }

    #[test]
    fn test_alerts_evaluate_each_reading_once() {
        let cell = Arc::new(LatestValueCell::new());
        let events = Arc::new(BoundedChannel::new(8, OverflowPolicy::Overwrite).unwrap());
        let mut task = alerts(spec(), cell.clone(), AlertChecker::default(), events.clone());

        cell.publish(reading(30.0, 1));
        task.run_once().unwrap();
        assert!(events.is_empty());

        cell.publish(reading(30.1, 2));
        task.run_once().unwrap();
        task.run_once().unwrap();
        assert_eq!(events.size(), 1);
        assert_eq!(events.try_pop().unwrap().timestamp_ms, 2);
    }

    #[test]
    fn test_broadcast_feeds_network_worker() {
        let cell = Arc::new(LatestValueCell::new());
        let outbound = Arc::new(BoundedChannel::new(2, OverflowPolicy::Overwrite).unwrap());
        let mut task = broadcast(spec(), cell.clone(), outbound.clone());

        for ts in 1..=3 {
            cell.publish(reading(21.0, ts));
            task.run_once().unwrap();
        }
        // Only the two newest survive the overwrite channel
        outbound.close();

        let capture = Capture::default();
        network_worker(outbound, Box::new(capture.clone()));
        let stamps: Vec<u64> = capture.0.lock().iter().map(|s| s.timestamp_ms).collect();
        assert_eq!(stamps, vec![2, 3]);
    }
}
