//! # Sensor Frame Module
//!
//! Text frames emitted by the sensor over the serial link.
//!
//! A frame is one line of text, optionally starting with a fixed start token
//! and carrying measurement fields separated by a fixed delimiter:
//!
//! ```text
//! start;12;0.4;0.1
//! ```
//!
//! Fields stay opaque text; numeric interpretation happens downstream.

pub mod parser;

pub use parser::{FrameFormat, ParsedReading};
