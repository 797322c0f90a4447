//! # Recording Sink
//!
//! One CSV file per session:
//!
//! ```text
//! timestamp,label,elapsed_seconds,feature_1,feature_2,feature_3
//! 2026-10-17 14:03:21.512,Coffee,0.00,12,0.4,0.1
//! ```

use chrono::{DateTime, Local};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Result, SensorError};

/// Wall-clock format of the timestamp column (millisecond precision)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Columns written before the measurement fields
const FIXED_COLUMNS: [&str; 3] = ["timestamp", "label", "elapsed_seconds"];

/// One persisted row
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub timestamp: DateTime<Local>,
    pub label: String,
    /// Seconds since session start, rounded to 2 decimals
    pub elapsed_seconds: f64,
    pub fields: Vec<String>,
}

impl Record {
    /// Build a record stamped with the current wall-clock time
    pub fn now(label: &str, elapsed: Duration, fields: Vec<String>) -> Self {
        Self {
            timestamp: Local::now(),
            label: label.to_string(),
            elapsed_seconds: round_centis(elapsed.as_secs_f64()),
            fields,
        }
    }

    fn to_row(&self) -> Vec<String> {
        let mut row = Vec::with_capacity(FIXED_COLUMNS.len() + self.fields.len());
        row.push(self.timestamp.format(TIMESTAMP_FORMAT).to_string());
        row.push(self.label.clone());
        row.push(format!("{:.2}", self.elapsed_seconds));
        row.extend(self.fields.iter().cloned());
        row
    }
}

fn round_centis(seconds: f64) -> f64 {
    (seconds * 100.0).round() / 100.0
}

/// Header for a session with `field_count` measurement fields
pub fn header(field_count: usize) -> Vec<String> {
    FIXED_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain((1..=field_count).map(|i| format!("feature_{}", i)))
        .collect()
}

/// Append-only CSV writer for one session
pub struct RecordingSink {
    path: PathBuf,
    field_count: usize,
    /// `None` once closed
    writer: Option<csv::Writer<File>>,
    rows: u64,
}

impl std::fmt::Debug for RecordingSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingSink")
            .field("path", &self.path)
            .field("field_count", &self.field_count)
            .field("rows", &self.rows)
            .field("open", &self.writer.is_some())
            .finish()
    }
}

impl RecordingSink {
    /// Create the session file and write its header
    ///
    /// Parent directories are created as needed. An existing file at `path`
    /// is truncated.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Io`] if the directory or file cannot be created,
    /// or the header cannot be written.
    pub fn open<P: AsRef<Path>>(path: P, field_count: usize) -> Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(header(field_count))?;
        writer.flush()?;
        writer.get_ref().sync_data()?;

        info!("Data will be saved to '{}' ({} features)", path.display(), field_count);
        Ok(Self {
            path: path.to_path_buf(),
            field_count,
            writer: Some(writer),
            rows: 0,
        })
    }

    /// Append one record and push it to storage before returning
    ///
    /// Blocks the calling thread on `sync_data`. Async callers go through
    /// `block_in_place` where the runtime allows it.
    ///
    /// # Errors
    ///
    /// - [`SensorError::MalformedFrame`] if the record width differs from the header
    /// - [`SensorError::Io`] / [`SensorError::Csv`] on write failure or when closed
    pub fn append(&mut self, record: &Record) -> Result<()> {
        if record.fields.len() != self.field_count {
            return Err(SensorError::MalformedFrame {
                expected: self.field_count,
                found: record.fields.len(),
            });
        }

        let writer = self.writer.as_mut().ok_or_else(|| {
            SensorError::Io(io::Error::new(io::ErrorKind::Other, "recording sink is closed"))
        })?;

        writer.write_record(record.to_row())?;
        writer.flush()?;
        writer.get_ref().sync_data()?;
        self.rows += 1;

        debug!("Appended row {} at {:.2}s", self.rows, record.elapsed_seconds);
        Ok(())
    }

    /// Flush and release the file. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            writer.get_ref().sync_all()?;
            debug!("Closed '{}' after {} rows", self.path.display(), self.rows);
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn field_count(&self) -> usize {
        self.field_count
    }

    /// Data rows written so far (header excluded)
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fields(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_header_layout() {
        assert_eq!(
            header(3),
            vec!["timestamp", "label", "elapsed_seconds", "feature_1", "feature_2", "feature_3"]
        );
        assert_eq!(header(0).len(), 3);
        assert_eq!(header(64).len(), 67);
    }

    #[test]
    fn test_open_creates_parent_dirs_and_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/deeper/session.csv");

        let sink = RecordingSink::open(&path, 2).unwrap();
        assert!(sink.is_open());
        assert_eq!(sink.field_count(), 2);
        assert_eq!(sink.path(), path.as_path());

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "timestamp,label,elapsed_seconds,feature_1,feature_2\n");
    }

    #[test]
    fn test_open_unwritable_path_is_io_error() {
        let dir = tempdir().unwrap();
        // A regular file cannot act as a parent directory
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        let result = RecordingSink::open(blocker.join("session.csv"), 3);
        assert!(matches!(result, Err(SensorError::Io(_))));
    }

    #[test]
    fn test_append_is_visible_immediately() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.csv");
        let mut sink = RecordingSink::open(&path, 3).unwrap();

        let record = Record::now("Coffee", Duration::from_millis(1234), fields(&["12", "0.4", "0.1"]));
        sink.append(&record).unwrap();
        assert_eq!(sink.rows(), 1);

        // Read back without closing the sink
        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].ends_with(",Coffee,1.23,12,0.4,0.1"), "row was: {}", lines[1]);
    }

    #[test]
    fn test_timestamp_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.csv");
        let mut sink = RecordingSink::open(&path, 1).unwrap();
        sink.append(&Record::now("Air", Duration::ZERO, fields(&["1"]))).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let row = reader.records().next().unwrap().unwrap();
        let stamp = &row[0];
        // YYYY-MM-DD HH:MM:SS.mmm
        assert_eq!(stamp.len(), 23);
        assert!(chrono::NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S%.3f").is_ok());
        assert_eq!(&row[2], "0.00");
    }

    #[test]
    fn test_wrong_width_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.csv");
        let mut sink = RecordingSink::open(&path, 3).unwrap();

        let short = Record::now("Air", Duration::ZERO, fields(&["1", "2"]));
        match sink.append(&short) {
            Err(SensorError::MalformedFrame { expected, found }) => {
                assert_eq!(expected, 3);
                assert_eq!(found, 2);
            }
            other => panic!("Expected MalformedFrame, got: {:?}", other),
        }
        assert_eq!(sink.rows(), 0);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn test_label_with_delimiter_is_quoted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.csv");
        let mut sink = RecordingSink::open(&path, 1).unwrap();
        sink.append(&Record::now("Air, outdoor", Duration::ZERO, fields(&["5"]))).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[1], "Air, outdoor");
        assert_eq!(row.len(), 4);
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = tempdir().unwrap();
        let mut sink = RecordingSink::open(dir.path().join("session.csv"), 1).unwrap();

        sink.close().unwrap();
        sink.close().unwrap();
        assert!(!sink.is_open());

        let result = sink.append(&Record::now("Air", Duration::ZERO, fields(&["1"])));
        assert!(matches!(result, Err(SensorError::Io(_))));
    }

    #[test]
    fn test_elapsed_rounding() {
        let record = Record::now("Air", Duration::from_millis(2_345_678), fields(&[]));
        assert_eq!(record.elapsed_seconds, 2345.68);
        assert_eq!(round_centis(0.004), 0.0);
    }
}
