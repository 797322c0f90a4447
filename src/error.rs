//! # Error Types
//!
//! Custom error types for Sensor Logger using `thiserror`.

use thiserror::Error;

/// Main error type for Sensor Logger
#[derive(Debug, Error)]
pub enum SensorError {
    /// Serial device could not be opened (missing, busy, permission denied)
    #[error("Connection error: {0}")]
    Connection(String),

    /// I/O fault while reading from an open serial device
    #[error("Read error: {0}")]
    Read(String),

    /// The device produced no data when some was required
    #[error("No data from sensor: {0}")]
    NoData(String),

    /// A frame whose width does not match the session's header
    #[error("Malformed frame: expected {expected} fields, got {found}")]
    MalformedFrame { expected: usize, found: usize },

    /// A session is already running on this controller
    #[error("Data collection is already in progress")]
    AlreadyCollecting,

    /// No serial channel is open
    #[error("Not connected to a sensor")]
    NotConnected,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV writer errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Session manifest serialization errors
    #[error("Manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    /// Failures reported by downstream services (upload, inference, notification)
    #[error("Hand-off error: {0}")]
    Handoff(String),
}

/// Result type alias for Sensor Logger
pub type Result<T> = std::result::Result<T, SensorError>;
