//! # Recording Module
//!
//! Durable, append-only CSV recording of sensor sessions.
//!
//! This module handles:
//! - Creating the session file (and its directory) with a fixed-width header
//! - Appending one row per reading, flushed and synced before returning
//! - Writing a JSON manifest next to the file when a session ends

pub mod manifest;
pub mod sink;

pub use manifest::{manifest_path, write_manifest};
pub use sink::{Record, RecordingSink, TIMESTAMP_FORMAT};
