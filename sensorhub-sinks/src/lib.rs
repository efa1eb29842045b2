//! # sensorhub-sinks
//!
//! Destinations for sensor snapshots. Every sink implements [`SnapshotSink`],
//! so the hub's periodic tasks can hand a snapshot to "the log" or "the
//! network" without caring which concrete output is configured.
//!
//! - [`FileLogSink`]: append-only file, as human-readable text, JSON lines,
//!   or length-prefixed CBOR.
//! - [`UdpBroadcastSink`]: one JSON datagram per snapshot, fire-and-forget.
//! - [`NullSink`]: discards everything.
//!
//! ## Example
//!
//! ```rust,no_run
//! use sensorhub_sinks::{FileLogSink, LogFormat, SnapshotSink};
//! use sensorhub_types::SensorSnapshot;
//!
//! let mut sink = FileLogSink::open("sensor_log.txt", LogFormat::Text).unwrap();
//! sink.emit(&SensorSnapshot::new(23.5, 45.0, false, false, 1000)).unwrap();
//! ```

mod error;
mod file;
mod udp;

pub use error::SinkError;
pub use file::{FileLogSink, LogFormat};
pub use udp::UdpBroadcastSink;

use sensorhub_types::SensorSnapshot;

/// Something that accepts snapshots.
///
/// Sinks are owned by exactly one thread at a time, so `emit` takes
/// `&mut self` and implementations need no internal locking.
pub trait SnapshotSink: Send {
    /// Short name used in log messages.
    fn name(&self) -> &str;

    /// Write one snapshot.
    fn emit(&mut self, snapshot: &SensorSnapshot) -> Result<(), SinkError>;
}

impl<S: SnapshotSink + ?Sized> SnapshotSink for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn emit(&mut self, snapshot: &SensorSnapshot) -> Result<(), SinkError> {
        (**self).emit(snapshot)
    }
}

/// A sink that drops every snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl SnapshotSink for NullSink {
    fn name(&self) -> &str {
        "null"
    }

    fn emit(&mut self, _snapshot: &SensorSnapshot) -> Result<(), SinkError> {
        Ok(())
    }
}
