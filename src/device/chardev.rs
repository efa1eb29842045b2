//! The kernel driver's character device.

use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use sensorhub_types::{RecordError, SensorSnapshot, RECORD_LEN};
use tracing::debug;

use super::{DeviceError, SensorDevice};

/// Where the driver registers its device node.
pub const DEFAULT_DEVICE_PATH: &str = "/dev/sensorhub";

/// Driver ioctl that clears the "data ready" flag.
const IOCTL_RESET_DATA_READY: libc::c_ulong = 0x01;

/// Reads fixed-layout records from the sensor driver.
///
/// The device is opened non-blocking: a read with no fresh data fails with
/// `EAGAIN`, which is reported as "no data yet".
#[derive(Debug)]
pub struct CharDevice {
    file: File,
    path: PathBuf,
    description: String,
}

impl CharDevice {
    /// Open the device node read-only and non-blocking.
    ///
    /// Failure here means the driver is not loaded; callers treat it as
    /// fatal at startup.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DeviceError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&path)
            .map_err(|source| DeviceError::Open {
                path: path.display().to_string(),
                source,
            })?;
        let description = format!("chardev: {}", path.display());
        Ok(Self {
            file,
            path,
            description,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SensorDevice for CharDevice {
    fn try_read(&mut self) -> Result<Option<SensorSnapshot>, DeviceError> {
        let mut record = [0u8; RECORD_LEN];
        match self.file.read(&mut record) {
            Ok(n) if n == RECORD_LEN => Ok(Some(SensorSnapshot::from_record(&record)?)),
            // Driver returns 0 when nothing new has been latched
            Ok(0) => Ok(None),
            Ok(n) => Err(RecordError::Length { actual: n }.into()),
            Err(e) if is_transient(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn reset(&mut self) -> Result<(), DeviceError> {
        // SAFETY: the fd is owned by `self.file` and stays open for the call;
        // this request takes no argument.
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), IOCTL_RESET_DATA_READY as _) };
        if rc < 0 {
            return Err(io::Error::last_os_error().into());
        }
        debug!("Cleared data-ready flag on {}", self.path.display());
        Ok(())
    }

    fn description(&self) -> &str {
        &self.description
    }
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_device_is_open_error() {
        let err = CharDevice::open("/nonexistent/sensorhub").unwrap_err();
        assert!(matches!(err, DeviceError::Open { .. }));
        assert!(err.to_string().contains("/nonexistent/sensorhub"));
    }

    #[test]
    fn test_reads_record_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record.bin");
        let snapshot = SensorSnapshot::new(24.0, 50.0, true, false, 99);
        std::fs::write(&path, snapshot.to_record()).unwrap();

        let mut device = CharDevice::open(&path).unwrap();
        assert_eq!(device.try_read().unwrap(), Some(snapshot));
        // End of a regular file looks like "nothing latched"
        assert_eq!(device.try_read().unwrap(), None);
    }

    #[test]
    fn test_short_record_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.bin");
        std::fs::write(&path, [0u8; 10]).unwrap();

        let mut device = CharDevice::open(&path).unwrap();
        assert!(matches!(device.try_read(), Err(DeviceError::Record(_))));
    }

    #[test]
    fn test_transient_errors() {
        assert!(is_transient(&io::Error::from(io::ErrorKind::WouldBlock)));
        assert!(is_transient(&io::Error::from(io::ErrorKind::Interrupted)));
        assert!(!is_transient(&io::Error::from(io::ErrorKind::NotFound)));
    }
}
