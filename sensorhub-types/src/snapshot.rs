//! SensorSnapshot - one reading of every sensor on the hub.

use core::fmt;

/// Lowest temperature the logger treats as a real reading.
///
/// Readings at or below this bound come from a failed conversion rather
/// than from the room the sensor sits in.
pub const MIN_PLAUSIBLE_TEMPERATURE: f32 = -40.0;

/// A point-in-time reading of all hub sensors.
///
/// Snapshots are produced by the device reader and copied by value to every
/// consumer. They are never mutated after construction.
///
/// # Example
///
/// ```rust
/// use sensorhub_types::SensorSnapshot;
///
/// let snapshot = SensorSnapshot::new(23.5, 45.0, false, true, 1_703_160_000_000);
/// assert!(snapshot.button_pressed);
/// assert!(snapshot.is_plausible());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct SensorSnapshot {
    /// Temperature in degrees Celsius.
    #[cfg_attr(feature = "minicbor", n(0))]
    pub temperature: f32,

    /// Relative humidity in percent.
    #[cfg_attr(feature = "minicbor", n(1))]
    pub humidity: f32,

    /// PIR sensor saw motion since the previous sample.
    #[cfg_attr(feature = "minicbor", n(2))]
    #[cfg_attr(feature = "serde", serde(default))]
    pub motion_detected: bool,

    /// Push button was pressed since the previous sample.
    #[cfg_attr(feature = "minicbor", n(3))]
    #[cfg_attr(feature = "serde", serde(default))]
    pub button_pressed: bool,

    /// Sample time in milliseconds, as reported by the device.
    #[cfg_attr(feature = "minicbor", n(4))]
    pub timestamp_ms: u64,
}

impl SensorSnapshot {
    /// Create a snapshot from individual readings.
    pub const fn new(
        temperature: f32,
        humidity: f32,
        motion_detected: bool,
        button_pressed: bool,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            temperature,
            humidity,
            motion_detected,
            button_pressed,
            timestamp_ms,
        }
    }

    /// Return a copy with a different temperature.
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Return a copy with a different humidity.
    pub const fn with_humidity(mut self, humidity: f32) -> Self {
        self.humidity = humidity;
        self
    }

    /// Return a copy with the motion flag set.
    pub const fn with_motion(mut self, motion_detected: bool) -> Self {
        self.motion_detected = motion_detected;
        self
    }

    /// Return a copy with the button flag set.
    pub const fn with_button(mut self, button_pressed: bool) -> Self {
        self.button_pressed = button_pressed;
        self
    }

    /// Return a copy with a different timestamp.
    pub const fn with_timestamp(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    /// Whether the readings look like a working sensor.
    ///
    /// Failed conversions show up as impossible values; the logger skips
    /// those instead of filling the log with garbage.
    pub fn is_plausible(&self) -> bool {
        self.temperature > MIN_PLAUSIBLE_TEMPERATURE && self.humidity >= 0.0
    }
}

impl fmt::Display for SensorSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] Temp: {:.2}°C, Humidity: {:.2}%, Motion: {}, Button: {}",
            self.timestamp_ms,
            self.temperature,
            self.humidity,
            yes_no(self.motion_detected),
            yes_no(self.button_pressed),
        )
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "YES"
    } else {
        "NO"
    }
}
