//! Simulated sensor, matching the driver's fallback when no I2C part answers.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sensorhub_types::SensorSnapshot;
use serde::Deserialize;

use super::{DeviceError, SensorDevice};

/// Parameters for [`SimulatedDevice`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulatedConfig {
    /// Time between new samples.
    #[serde(deserialize_with = "crate::config::duration::deserialize")]
    pub interval: Duration,
    /// Lowest temperature produced; readings add up to 9.9 °C on top.
    pub base_temperature: f32,
    /// Lowest humidity produced; readings add up to 29.9 % on top.
    pub base_humidity: f32,
    /// Chance that a sample reports motion.
    pub motion_probability: f64,
    /// Chance that a sample reports a button press.
    pub button_probability: f64,
    /// Fixed seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            base_temperature: 23.5,
            base_humidity: 45.0,
            motion_probability: 0.05,
            button_probability: 0.01,
            seed: None,
        }
    }
}

/// Produces a pseudo-random walk at a fixed interval.
///
/// The first sample is drawn anywhere in the driver's range; each later one
/// moves at most half a degree and a percent and a half of humidity from the
/// previous, staying inside the range.
///
/// Between samples [`try_read`](SensorDevice::try_read) reports "no data
/// yet", just like the real driver between timer ticks. Timestamps are
/// milliseconds since the device was created.
#[derive(Debug)]
pub struct SimulatedDevice {
    config: SimulatedConfig,
    rng: StdRng,
    started: Instant,
    next_sample: Instant,
    /// Last (temperature, humidity) handed out.
    current: Option<(f32, f32)>,
    description: String,
}

impl SimulatedDevice {
    pub fn new(config: SimulatedConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let now = Instant::now();
        let description = format!("simulated: every {:?}", config.interval);
        Self {
            config,
            rng,
            started: now,
            next_sample: now,
            current: None,
            description,
        }
    }

    fn sample(&mut self, now: Instant) -> SensorSnapshot {
        let (min_t, max_t) = (self.config.base_temperature, self.config.base_temperature + 9.9);
        let (min_h, max_h) = (self.config.base_humidity, self.config.base_humidity + 29.9);

        let (temperature, humidity) = match self.current {
            None => (
                min_t + self.rng.gen_range(0..100u32) as f32 / 10.0,
                min_h + self.rng.gen_range(0..300u32) as f32 / 10.0,
            ),
            Some((t, h)) => (
                (t + self.rng.gen_range(-5..=5i32) as f32 / 10.0).clamp(min_t, max_t),
                (h + self.rng.gen_range(-15..=15i32) as f32 / 10.0).clamp(min_h, max_h),
            ),
        };
        self.current = Some((temperature, humidity));
        let motion = self.rng.gen_bool(self.config.motion_probability.clamp(0.0, 1.0));
        let button = self.rng.gen_bool(self.config.button_probability.clamp(0.0, 1.0));
        let timestamp_ms = now.duration_since(self.started).as_millis() as u64;

        SensorSnapshot::new(temperature, humidity, motion, button, timestamp_ms)
    }
}

impl SensorDevice for SimulatedDevice {
    fn try_read(&mut self) -> Result<Option<SensorSnapshot>, DeviceError> {
        let now = Instant::now();
        if now < self.next_sample {
            return Ok(None);
        }
        self.next_sample = now + self.config.interval;
        Ok(Some(self.sample(now)))
    }

    fn reset(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn description(&self) -> &str {
        &self.description
    }
}
