//! # Sensor Logger Library
//!
//! Record readings from a multi-channel chemical sensor into CSV sessions.
//!
//! This library provides the acquisition core: the serial frame channel, the
//! frame parser, a fixed-cadence background acquisition loop, a durable
//! recording sink and the session lifecycle that ties them together.

pub mod acquisition;
pub mod config;
pub mod error;
pub mod frame;
pub mod handoff;
pub mod recording;
pub mod serial;
pub mod session;
