//! Threshold alerting.

use sensorhub_types::{Alert, AlertEvent, AlertThresholds, SensorSnapshot};

/// Checks snapshots against configured thresholds.
///
/// Comparisons are strictly greater-than: a reading exactly at a threshold
/// raises nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AlertChecker {
    thresholds: AlertThresholds,
}

impl AlertChecker {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    /// Alerts raised by one snapshot, in a fixed order: temperature,
    /// humidity, motion, button.
    pub fn check(&self, snapshot: &SensorSnapshot) -> Vec<Alert> {
        self.thresholds.evaluate(snapshot)
    }

    /// Like [`check`](Self::check), stamped with the snapshot's time.
    pub fn events(&self, snapshot: &SensorSnapshot) -> Vec<AlertEvent> {
        self.check(snapshot)
            .into_iter()
            .map(|alert| AlertEvent {
                alert,
                timestamp_ms: snapshot.timestamp_ms,
            })
            .collect()
    }
}
