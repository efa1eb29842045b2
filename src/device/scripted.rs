//! Scripted device for tests and demos.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use sensorhub_types::SensorSnapshot;

use super::{DeviceError, SensorDevice};

/// One scripted outcome of [`SensorDevice::try_read`].
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedRead {
    Sample(SensorSnapshot),
    NoData,
    Fail(String),
}

impl From<SensorSnapshot> for ScriptedRead {
    fn from(snapshot: SensorSnapshot) -> Self {
        ScriptedRead::Sample(snapshot)
    }
}

#[derive(Debug, Default)]
struct Script {
    reads: VecDeque<ScriptedRead>,
    resets: usize,
    calls: usize,
}

/// Plays back a queue of outcomes, then reports "no data" forever.
///
/// Clones share the same script, so a test can keep one clone to feed more
/// outcomes and inspect calls after the device itself was moved into a
/// reader.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDevice {
    script: Arc<Mutex<Script>>,
}

impl ScriptedDevice {
    pub fn new<I>(reads: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ScriptedRead>,
    {
        let device = Self::default();
        device.extend(reads);
        device
    }

    /// Append outcomes to the end of the script.
    pub fn extend<I>(&self, reads: I)
    where
        I: IntoIterator,
        I::Item: Into<ScriptedRead>,
    {
        self.script
            .lock()
            .reads
            .extend(reads.into_iter().map(Into::into));
    }

    /// Append a single outcome.
    pub fn push(&self, read: impl Into<ScriptedRead>) {
        self.script.lock().reads.push_back(read.into());
    }

    /// Outcomes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().reads.len()
    }

    /// How many times `reset()` was called.
    pub fn resets(&self) -> usize {
        self.script.lock().resets
    }

    /// How many times `try_read()` was called.
    pub fn calls(&self) -> usize {
        self.script.lock().calls
    }
}

impl SensorDevice for ScriptedDevice {
    fn try_read(&mut self) -> Result<Option<SensorSnapshot>, DeviceError> {
        let mut script = self.script.lock();
        script.calls += 1;
        match script.reads.pop_front() {
            Some(ScriptedRead::Sample(snapshot)) => Ok(Some(snapshot)),
            Some(ScriptedRead::NoData) | None => Ok(None),
            Some(ScriptedRead::Fail(msg)) => Err(DeviceError::Io(std::io::Error::other(msg))),
        }
    }

    fn reset(&mut self) -> Result<(), DeviceError> {
        self.script.lock().resets += 1;
        Ok(())
    }

    fn description(&self) -> &str {
        "scripted"
    }
}
