//! Fixed-layout device record exchanged with the sensorhub character device.
//!
//! The driver copies its `struct sensor_data` straight to userspace:
//!
//! ```text
//! offset  size  field
//!      0     4  f32  temperature (°C)
//!      4     4  f32  humidity (%)
//!      8     4  i32  motion_detected (non-zero = true)
//!     12     4  i32  button_pressed (non-zero = true)
//!     16     8  u64  timestamp (ms)
//! ```
//!
//! Fields are in host byte order, since producer and consumer always share
//! the same machine.

use core::fmt;

use crate::SensorSnapshot;

/// Size of one device record in bytes.
pub const RECORD_LEN: usize = 24;

/// Errors decoding a device record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    /// The buffer did not hold exactly one record.
    Length {
        /// Bytes actually available.
        actual: usize,
    },
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::Length { actual } => write!(
                f,
                "device record must be {} bytes, got {}",
                RECORD_LEN, actual
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RecordError {}

impl SensorSnapshot {
    /// Decode a snapshot from a raw device record.
    ///
    /// # Example
    ///
    /// ```rust
    /// use sensorhub_types::{SensorSnapshot, RECORD_LEN};
    ///
    /// let original = SensorSnapshot::new(22.0, 50.0, true, false, 42);
    /// let bytes = original.to_record();
    /// assert_eq!(bytes.len(), RECORD_LEN);
    /// assert_eq!(SensorSnapshot::from_record(&bytes), Ok(original));
    /// ```
    pub fn from_record(bytes: &[u8]) -> Result<Self, RecordError> {
        let record: &[u8; RECORD_LEN] = bytes
            .try_into()
            .map_err(|_| RecordError::Length {
                actual: bytes.len(),
            })?;

        Ok(Self {
            temperature: f32::from_ne_bytes(field(record, 0)),
            humidity: f32::from_ne_bytes(field(record, 4)),
            motion_detected: i32::from_ne_bytes(field(record, 8)) != 0,
            button_pressed: i32::from_ne_bytes(field(record, 12)) != 0,
            timestamp_ms: u64::from_ne_bytes(field(record, 16)),
        })
    }

    /// Encode this snapshot in the device record layout.
    ///
    /// Used by simulated devices and tests that stand in for the driver.
    pub fn to_record(&self) -> [u8; RECORD_LEN] {
        let mut out = [0u8; RECORD_LEN];
        out[0..4].copy_from_slice(&self.temperature.to_ne_bytes());
        out[4..8].copy_from_slice(&self.humidity.to_ne_bytes());
        out[8..12].copy_from_slice(&(self.motion_detected as i32).to_ne_bytes());
        out[12..16].copy_from_slice(&(self.button_pressed as i32).to_ne_bytes());
        out[16..24].copy_from_slice(&self.timestamp_ms.to_ne_bytes());
        out
    }
}

fn field<const N: usize>(record: &[u8; RECORD_LEN], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&record[offset..offset + N]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_known_layout() {
        let mut raw = [0u8; RECORD_LEN];
        raw[0..4].copy_from_slice(&25.5f32.to_ne_bytes());
        raw[4..8].copy_from_slice(&61.25f32.to_ne_bytes());
        raw[8..12].copy_from_slice(&1i32.to_ne_bytes());
        raw[12..16].copy_from_slice(&0i32.to_ne_bytes());
        raw[16..24].copy_from_slice(&123_456u64.to_ne_bytes());

        let snapshot = SensorSnapshot::from_record(&raw).unwrap();
        assert_eq!(snapshot.temperature, 25.5);
        assert_eq!(snapshot.humidity, 61.25);
        assert!(snapshot.motion_detected);
        assert!(!snapshot.button_pressed);
        assert_eq!(snapshot.timestamp_ms, 123_456);
    }

    #[test]
    fn test_any_nonzero_flag_is_true() {
        let mut raw = SensorSnapshot::default().to_record();
        raw[12..16].copy_from_slice(&(-7i32).to_ne_bytes());

        let snapshot = SensorSnapshot::from_record(&raw).unwrap();
        assert!(snapshot.button_pressed);
    }

    #[test]
    fn test_short_record_rejected() {
        let raw = [0u8; RECORD_LEN - 1];
        assert_eq!(
            SensorSnapshot::from_record(&raw),
            Err(RecordError::Length {
                actual: RECORD_LEN - 1
            })
        );
    }

    #[test]
    fn test_long_record_rejected() {
        let raw = [0u8; RECORD_LEN + 8];
        assert!(SensorSnapshot::from_record(&raw).is_err());
    }
}
