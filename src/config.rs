//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::frame::FrameFormat;
use crate::session::SessionSettings;

/// Baud rates accepted for the sensor link
const SUPPORTED_BAUD_RATES: &[u32] = &[1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600];

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub frame: FrameConfig,
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Upper bound on a single line read
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Sensor frame layout
#[derive(Debug, Deserialize, Clone)]
pub struct FrameConfig {
    #[serde(default = "default_frame_prefix")]
    pub prefix: String,

    #[serde(default = "default_frame_delimiter")]
    pub delimiter: String,
}

/// Acquisition loop timing and failure policy
#[derive(Debug, Deserialize, Clone)]
pub struct AcquisitionConfig {
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u64,

    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,

    /// 0 disables the bound
    #[serde(default = "default_max_consecutive_misses")]
    pub max_consecutive_misses: u32,

    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,
}

/// Recording output configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RecordingConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

/// Application log configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_file_logging")]
    pub file_logging: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

/// Local archive hand-off configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ArchiveConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_archive_dir")]
    pub dir: String,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 9600 }
fn default_timeout_ms() -> u64 { 1000 }

fn default_frame_prefix() -> String { "start;".to_string() }
fn default_frame_delimiter() -> String { ";".to_string() }

fn default_tick_period_ms() -> u64 { 1000 }
fn default_progress_interval() -> u64 { 10 }
fn default_max_consecutive_misses() -> u32 { 30 }
fn default_join_timeout_ms() -> u64 { 2000 }

fn default_output_dir() -> String { "data".to_string() }

fn default_file_logging() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }

fn default_archive_dir() -> String { "./archive".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            prefix: default_frame_prefix(),
            delimiter: default_frame_delimiter(),
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: default_tick_period_ms(),
            progress_interval: default_progress_interval(),
            max_consecutive_misses: default_max_consecutive_misses(),
            join_timeout_ms: default_join_timeout_ms(),
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self { output_dir: default_output_dir() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file_logging: default_file_logging(),
            log_dir: default_log_dir(),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: default_archive_dir(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing sections and keys fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use sensor_logger::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if !SUPPORTED_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(invalid(format!(
                "baud_rate must be one of: {}",
                SUPPORTED_BAUD_RATES.iter().map(u32::to_string).collect::<Vec<_>>().join(", ")
            )));
        }

        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 10000 {
            return Err(invalid("timeout_ms must be between 1 and 10000"));
        }

        if self.frame.delimiter.is_empty() {
            return Err(invalid("frame delimiter cannot be empty"));
        }

        if self.acquisition.tick_period_ms == 0 || self.acquisition.tick_period_ms > 60000 {
            return Err(invalid("tick_period_ms must be between 1 and 60000"));
        }

        if self.acquisition.progress_interval == 0 {
            return Err(invalid("progress_interval must be greater than 0"));
        }

        if self.acquisition.join_timeout_ms == 0 || self.acquisition.join_timeout_ms > 60000 {
            return Err(invalid("join_timeout_ms must be between 1 and 60000"));
        }

        if self.recording.output_dir.is_empty() {
            return Err(invalid("recording output_dir cannot be empty"));
        }

        if self.logging.file_logging && self.logging.log_dir.is_empty() {
            return Err(invalid("log_dir cannot be empty when file logging is enabled"));
        }

        if self.archive.enabled && self.archive.dir.is_empty() {
            return Err(invalid("archive dir cannot be empty when archiving is enabled"));
        }

        Ok(())
    }

    /// Session settings derived from this configuration
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            format: FrameFormat::new(&self.frame.prefix, &self.frame.delimiter),
            read_timeout: Duration::from_millis(self.serial.timeout_ms),
            tick_period: Duration::from_millis(self.acquisition.tick_period_ms),
            progress_interval: self.acquisition.progress_interval,
            max_consecutive_misses: self.acquisition.max_consecutive_misses,
            join_timeout: Duration::from_millis(self.acquisition.join_timeout_ms),
            output_dir: PathBuf::from(&self.recording.output_dir),
        }
    }
}

fn invalid(msg: impl std::fmt::Display) -> crate::error::SensorError {
    crate::error::SensorError::Config(toml::de::Error::custom(msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_document_matches_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.serial.port, default_serial_port());
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.frame.prefix, "start;");
        assert_eq!(config.acquisition.tick_period_ms, 1000);
        assert!(!config.archive.enabled);
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[serial]
port = "/dev/cu.usbmodem1101"
baud_rate = 115200

[acquisition]
tick_period_ms = 1800

[recording]
output_dir = "sessions"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.serial.port, "/dev/cu.usbmodem1101");
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.serial.timeout_ms, 1000);
        assert_eq!(config.acquisition.tick_period_ms, 1800);
        assert_eq!(config.recording.output_dir, "sessions");
    }

    #[test]
    fn test_shipped_default_config() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.serial.baud_rate, default_baud_rate());
        assert_eq!(config.frame.prefix, default_frame_prefix());
        assert_eq!(config.acquisition.join_timeout_ms, default_join_timeout_ms());
        assert_eq!(config.recording.output_dir, default_output_dir());
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/sensor-logger.toml");
        assert!(matches!(result, Err(crate::error::SensorError::Io(_))));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[serial]\nbaud_rate = 12345\n").unwrap();
        temp_file.flush().unwrap();

        let result = Config::load(temp_file.path());
        assert!(matches!(result, Err(crate::error::SensorError::Config(_))));
    }

    #[test]
    fn test_empty_serial_port() {
        let mut config = Config::default();
        config.serial.port = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = Config::default();
        config.serial.baud_rate = 420000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_baud_rates() {
        for &baud in SUPPORTED_BAUD_RATES {
            let mut config = Config::default();
            config.serial.baud_rate = baud;
            assert!(config.validate().is_ok(), "Baud rate {} should be valid", baud);
        }
    }

    #[test]
    fn test_timeout_ms_zero() {
        let mut config = Config::default();
        config.serial.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_ms_too_high() {
        let mut config = Config::default();
        config.serial.timeout_ms = 10001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_delimiter() {
        let mut config = Config::default();
        config.frame.delimiter = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_prefix_is_allowed() {
        let mut config = Config::default();
        config.frame.prefix = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_tick_period_bounds() {
        let mut config = Config::default();
        config.acquisition.tick_period_ms = 0;
        assert!(config.validate().is_err());
        config.acquisition.tick_period_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_progress_interval_zero() {
        let mut config = Config::default();
        config.acquisition.progress_interval = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_join_timeout_zero() {
        let mut config = Config::default();
        config.acquisition.join_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unbounded_misses_is_allowed() {
        let mut config = Config::default();
        config.acquisition.max_consecutive_misses = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_output_dir() {
        let mut config = Config::default();
        config.recording.output_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_enabled() {
        let mut config = Config::default();
        config.logging.file_logging = true;
        config.logging.log_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_disabled() {
        let mut config = Config::default();
        config.logging.file_logging = false;
        config.logging.log_dir = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_archive_dir_when_enabled() {
        let mut config = Config::default();
        config.archive.enabled = true;
        config.archive.dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_session_settings_conversion() {
        let mut config = Config::default();
        config.acquisition.tick_period_ms = 1800;
        config.serial.timeout_ms = 250;

        let settings = config.session_settings();
        assert_eq!(settings.tick_period, Duration::from_millis(1800));
        assert_eq!(settings.read_timeout, Duration::from_millis(250));
        assert_eq!(settings.join_timeout, Duration::from_secs(2));
        assert_eq!(settings.max_consecutive_misses, 30);
        assert_eq!(settings.output_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_serial_port(), "/dev/ttyUSB0");
        assert_eq!(default_baud_rate(), 9600);
        assert_eq!(default_timeout_ms(), 1000);
        assert_eq!(default_frame_prefix(), "start;");
        assert_eq!(default_frame_delimiter(), ";");
        assert_eq!(default_tick_period_ms(), 1000);
        assert_eq!(default_progress_interval(), 10);
        assert_eq!(default_max_consecutive_misses(), 30);
        assert_eq!(default_join_timeout_ms(), 2000);
        assert_eq!(default_output_dir(), "data");
        assert_eq!(default_file_logging(), true);
        assert_eq!(default_log_dir(), "./logs");
        assert_eq!(default_archive_dir(), "./archive");
    }
}
