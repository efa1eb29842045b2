//! Alert thresholds and the alerts they raise.

use alloc::vec::Vec;
use core::fmt;

use crate::SensorSnapshot;

/// Default temperature alert threshold in °C.
pub const DEFAULT_TEMPERATURE_THRESHOLD: f32 = 30.0;

/// Default humidity alert threshold in %.
pub const DEFAULT_HUMIDITY_THRESHOLD: f32 = 80.0;

/// Limits above which a snapshot raises an alert.
///
/// Comparisons are strictly greater-than: a reading exactly at the
/// threshold is still considered normal.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AlertThresholds {
    /// Temperature threshold in °C.
    pub temperature_c: f32,
    /// Humidity threshold in %.
    pub humidity_pct: f32,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            temperature_c: DEFAULT_TEMPERATURE_THRESHOLD,
            humidity_pct: DEFAULT_HUMIDITY_THRESHOLD,
        }
    }
}

impl AlertThresholds {
    /// Evaluate a snapshot, returning every alert it raises.
    ///
    /// Alerts are returned in a fixed order: temperature, humidity,
    /// motion, button.
    pub fn evaluate(&self, snapshot: &SensorSnapshot) -> Vec<Alert> {
        let mut alerts = Vec::new();

        if snapshot.temperature > self.temperature_c {
            alerts.push(Alert::HighTemperature {
                value: snapshot.temperature,
                threshold: self.temperature_c,
            });
        }

        if snapshot.humidity > self.humidity_pct {
            alerts.push(Alert::HighHumidity {
                value: snapshot.humidity,
                threshold: self.humidity_pct,
            });
        }

        if snapshot.motion_detected {
            alerts.push(Alert::Motion);
        }

        if snapshot.button_pressed {
            alerts.push(Alert::ButtonPressed);
        }

        alerts
    }
}

/// A condition worth telling someone about.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum Alert {
    /// Temperature above the configured threshold.
    HighTemperature { value: f32, threshold: f32 },
    /// Humidity above the configured threshold.
    HighHumidity { value: f32, threshold: f32 },
    /// The PIR sensor fired.
    Motion,
    /// The push button was pressed.
    ButtonPressed,
}

impl Alert {
    /// Stable short identifier, suitable for log fields and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Alert::HighTemperature { .. } => "high_temperature",
            Alert::HighHumidity { .. } => "high_humidity",
            Alert::Motion => "motion",
            Alert::ButtonPressed => "button_pressed",
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alert::HighTemperature { value, threshold } => write!(
                f,
                "High temperature: {:.2} C (threshold {:.2} C)",
                value, threshold
            ),
            Alert::HighHumidity { value, threshold } => write!(
                f,
                "High humidity: {:.2} % (threshold {:.2} %)",
                value, threshold
            ),
            Alert::Motion => write!(f, "Motion detected!"),
            Alert::ButtonPressed => write!(f, "Button pressed!"),
        }
    }
}

/// An alert tagged with the snapshot time that raised it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlertEvent {
    /// What happened.
    pub alert: Alert,
    /// Timestamp of the snapshot that raised it.
    pub timestamp_ms: u64,
}
