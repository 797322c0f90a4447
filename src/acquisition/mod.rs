//! # Acquisition Module
//!
//! Fixed-cadence background collection of sensor frames.
//!
//! This module handles:
//! - Reading one frame per tick with a short bounded wait
//! - Scheduling tick N at `session start + N × period` so lateness never accumulates
//! - Appending each reading to the session's recording sink
//! - Ending the session on the first read, parse or write fault
//! - Cooperative cancellation at the read and sleep suspension points

pub mod state;
pub mod worker;

pub use state::{LoopState, LoopStatus, SessionSummary};
pub use worker::{next_read_at, AcquisitionLoop, LoopOutcome, LoopSettings};
