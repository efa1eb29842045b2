//! Append-only file log.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use sensorhub_types::SensorSnapshot;

use crate::{SinkError, SnapshotSink};

/// Record encoding for [`FileLogSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// `[<ts>] Temp: 23.50°C, Humidity: 45.00%, Motion: NO, Button: NO`
    #[default]
    Text,
    /// One JSON object per line.
    JsonLines,
    /// CBOR records, each preceded by its length as a little-endian `u32`.
    Cbor,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" | "jsonl" | "json_lines" | "json-lines" => Ok(LogFormat::JsonLines),
            "cbor" => Ok(LogFormat::Cbor),
            other => Err(format!(
                "unknown log format '{}' (expected text, json_lines or cbor)",
                other
            )),
        }
    }
}

/// Appends one record per snapshot to a file.
///
/// Existing content is preserved. Every record is flushed as soon as it is
/// written, so a crash loses at most the snapshot being written.
#[derive(Debug)]
pub struct FileLogSink {
    path: PathBuf,
    format: LogFormat,
    writer: BufWriter<File>,
}

impl FileLogSink {
    /// Open (or create) `path` for appending.
    pub fn open(path: impl AsRef<Path>, format: LogFormat) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            format,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }
}

impl SnapshotSink for FileLogSink {
    fn name(&self) -> &str {
        "file"
    }

    fn emit(&mut self, snapshot: &SensorSnapshot) -> Result<(), SinkError> {
        match self.format {
            LogFormat::Text => writeln!(self.writer, "{}", snapshot)?,
            LogFormat::JsonLines => {
                serde_json::to_writer(&mut self.writer, snapshot)?;
                self.writer.write_all(b"\n")?;
            }
            LogFormat::Cbor => {
                let bytes = minicbor::to_vec(snapshot)?;
                let len = u32::try_from(bytes.len())
                    .map_err(|_| SinkError::Encode("CBOR record exceeds u32 length".into()))?;
                self.writer.write_all(&len.to_le_bytes())?;
                self.writer.write_all(&bytes)?;
            }
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn sample(ts: u64) -> SensorSnapshot {
        SensorSnapshot::new(23.5, 45.0, ts % 2 == 1, false, ts)
    }

    #[test]
    fn test_text_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sensor_log.txt");

        let mut sink = FileLogSink::open(&path, LogFormat::Text).unwrap();
        sink.emit(&sample(1000)).unwrap();
        sink.emit(&sample(1001)).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(
            lines,
            vec![
                "[1000] Temp: 23.50°C, Humidity: 45.00%, Motion: NO, Button: NO",
                "[1001] Temp: 23.50°C, Humidity: 45.00%, Motion: YES, Button: NO",
            ]
        );
    }

    #[test]
    fn test_appends_to_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        fs::write(&path, "previous run\n").unwrap();

        let mut sink = FileLogSink::open(&path, LogFormat::Text).unwrap();
        sink.emit(&sample(2)).unwrap();
        drop(sink);

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("previous run\n[2] Temp:"));
    }

    #[test]
    fn test_json_lines_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.jsonl");

        let mut sink = FileLogSink::open(&path, LogFormat::JsonLines).unwrap();
        sink.emit(&sample(10)).unwrap();
        sink.emit(&sample(11)).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let parsed: Vec<SensorSnapshot> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(parsed, vec![sample(10), sample(11)]);
    }

    #[test]
    fn test_cbor_records_are_length_prefixed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.cbor");

        let mut sink = FileLogSink::open(&path, LogFormat::Cbor).unwrap();
        sink.emit(&sample(5)).unwrap();
        sink.emit(&sample(6)).unwrap();

        let bytes = fs::read(&path).unwrap();
        let mut rest = bytes.as_slice();
        let mut decoded = Vec::new();
        while !rest.is_empty() {
            let len = u32::from_le_bytes(rest[..4].try_into().unwrap()) as usize;
            let record: SensorSnapshot = minicbor::decode(&rest[4..4 + len]).unwrap();
            decoded.push(record);
            rest = &rest[4 + len..];
        }
        assert_eq!(decoded, vec![sample(5), sample(6)]);
    }

    #[test]
    fn test_open_fails_for_missing_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("log.txt");
        assert!(matches!(
            FileLogSink::open(path, LogFormat::Text),
            Err(SinkError::Io(_))
        ));
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("text".parse::<LogFormat>(), Ok(LogFormat::Text));
        assert_eq!("JSONL".parse::<LogFormat>(), Ok(LogFormat::JsonLines));
        assert_eq!("cbor".parse::<LogFormat>(), Ok(LogFormat::Cbor));
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
