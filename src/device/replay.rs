//! Replays a recorded session from a JSON-lines file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use sensorhub_types::SensorSnapshot;

use super::{DeviceError, SensorDevice};

/// Default time between replayed samples.
pub const DEFAULT_REPLAY_INTERVAL: Duration = Duration::from_secs(1);

/// Hands out snapshots recorded one JSON object per line.
///
/// Each [`try_read`](SensorDevice::try_read) returns the next line, at most
/// one per [`interval`](Self::paced); in between it reports "no data yet".
/// Blank lines are skipped. A malformed line fails that call only; the next
/// call moves on. When the file is exhausted the device either reports "no
/// data" forever or starts over, depending on `looping`.
///
/// Every pass after the first is shifted forward in time so it starts one
/// interval after the last sample handed out, keeping timestamps monotonic
/// across wraps.
///
/// Files written by the JSON-lines log sink can be replayed directly.
#[derive(Debug)]
pub struct ReplayDevice {
    path: PathBuf,
    lines: Vec<String>,
    position: usize,
    looping: bool,
    interval: Duration,
    next_sample: Option<Instant>,
    /// Added to recorded timestamps in the current pass.
    shift: u64,
    rebase: bool,
    last_emitted: Option<u64>,
    description: String,
}

impl ReplayDevice {
    /// Load a recording from disk.
    pub fn open(path: impl AsRef<Path>, looping: bool) -> Result<Self, DeviceError> {
        let path = path.as_ref().to_path_buf();
        let content = fs::read_to_string(&path).map_err(|source| DeviceError::Open {
            path: path.display().to_string(),
            source,
        })?;
        let description = format!("replay: {}", path.display());
        Ok(Self::build(path, &content, looping, description))
    }

    /// Replay from an in-memory recording.
    pub fn from_recording(content: &str, looping: bool) -> Self {
        Self::build(PathBuf::new(), content, looping, "replay: <memory>".to_string())
    }

    fn build(path: PathBuf, content: &str, looping: bool, description: String) -> Self {
        let lines = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
        Self {
            path,
            lines,
            position: 0,
            looping,
            interval: DEFAULT_REPLAY_INTERVAL,
            next_sample: None,
            shift: 0,
            rebase: false,
            last_emitted: None,
            description,
        }
    }

    /// Hand out at most one sample per `interval`. Zero replays as fast as
    /// the reader polls.
    pub fn paced(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of recorded samples, including malformed ones.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl SensorDevice for ReplayDevice {
    fn try_read(&mut self) -> Result<Option<SensorSnapshot>, DeviceError> {
        let now = Instant::now();
        if self.next_sample.is_some_and(|due| now < due) {
            return Ok(None);
        }
        if self.position >= self.lines.len() {
            if !self.looping || self.lines.is_empty() {
                return Ok(None);
            }
            self.position = 0;
            self.rebase = true;
        }

        self.next_sample = Some(now + self.interval);
        let line = &self.lines[self.position];
        self.position += 1;
        let mut snapshot: SensorSnapshot = serde_json::from_str(line)
            .map_err(|e| DeviceError::Parse(format!("line {}: {}", self.position, e)))?;

        if self.rebase {
            self.rebase = false;
            if let Some(last) = self.last_emitted {
                let step = (self.interval.as_millis() as u64).max(1);
                self.shift = last.saturating_add(step).saturating_sub(snapshot.timestamp_ms);
            }
        }
        snapshot.timestamp_ms = snapshot.timestamp_ms.saturating_add(self.shift);
        self.last_emitted = Some(snapshot.timestamp_ms);
        Ok(Some(snapshot))
    }

    fn reset(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn description(&self) -> &str {
        &self.description
    }
}
