//! JSON sidecar describing a finished session.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::acquisition::SessionSummary;
use crate::error::Result;

/// `<data file>.json`
pub fn manifest_path(data_path: &Path) -> PathBuf {
    let mut name = OsString::from(data_path.as_os_str());
    name.push(".json");
    PathBuf::from(name)
}

/// Write the session summary next to its data file
///
/// # Errors
///
/// Returns error if serialization or the file write fails.
pub fn write_manifest(summary: &SessionSummary) -> Result<PathBuf> {
    let path = manifest_path(&summary.path);
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(&path, json)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::LoopState;
    use chrono::Local;
    use tempfile::tempdir;

    #[test]
    fn test_manifest_path() {
        assert_eq!(
            manifest_path(Path::new("data/sensor_data_Air_20261017_101500.csv")),
            PathBuf::from("data/sensor_data_Air_20261017_101500.csv.json")
        );
    }

    #[test]
    fn test_write_manifest() {
        let dir = tempdir().unwrap();
        let summary = SessionSummary {
            label: "Coffee".to_string(),
            path: dir.path().join("session.csv"),
            started_at: Local::now(),
            field_count: 3,
            records: 42,
            elapsed_seconds: 41.5,
            state: LoopState::Failed,
            failure: Some("Read error: unplugged".to_string()),
        };

        let path = write_manifest(&summary).unwrap();
        assert_eq!(path, dir.path().join("session.csv.json"));

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["label"], "Coffee");
        assert_eq!(value["records"], 42);
        assert_eq!(value["state"], "failed");
        assert_eq!(value["failure"], "Read error: unplugged");
    }
}
