//! # Acquisition Loop
//!
//! The background worker that owns a session while it runs.
//!
//! ## Cadence
//!
//! After each tick the next read is scheduled at
//! `start + (records + 1) × period`, anchored to the session start instead of
//! the end of the previous tick. A slow read delays one tick; the ticks after
//! it run back-to-back until the schedule is caught up, so the long-run rate
//! stays at the configured period.
//!
//! ## Termination
//!
//! The loop ends `Stopped` when its [`CancellationToken`] fires and `Failed`
//! on the first read, parse or write fault. Either way the sink is closed, a
//! manifest is written and the serial channel is handed back in the
//! [`LoopOutcome`].

use chrono::{DateTime, Local};
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::state::{LoopState, LoopStatus, SessionSummary};
use crate::error::{Result, SensorError};
use crate::frame::FrameFormat;
use crate::recording::{write_manifest, Record, RecordingSink};
use crate::serial::FrameSource;

/// Timing and failure policy of the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    /// Upper bound on one frame read
    pub read_timeout: Duration,
    /// Target spacing between ticks
    pub tick_period: Duration,
    /// Log a progress line every N records (0 = never)
    pub progress_interval: u64,
    /// Fail after this many empty reads in a row (0 = never)
    pub max_consecutive_misses: u32,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(1),
            tick_period: Duration::from_secs(1),
            progress_interval: 10,
            max_consecutive_misses: 30,
        }
    }
}

/// What the loop hands back when it ends
pub struct LoopOutcome {
    /// The channel loaned to the loop for the session
    pub source: Box<dyn FrameSource>,
    pub summary: SessionSummary,
}

/// Instant of the read following `records` persisted rows
pub fn next_read_at(start: Instant, records: u64, period: Duration) -> Instant {
    let ticks = u32::try_from(records.saturating_add(1)).unwrap_or(u32::MAX);
    start + period.saturating_mul(ticks)
}

/// Whether the `records`-th record gets a progress line
fn progress_due(records: u64, interval: u64) -> bool {
    interval > 0 && records > 0 && records % interval == 0
}

/// Run a synchronous flush/fsync without stalling other tasks on a worker
/// thread. Current-thread runtimes cannot hand the thread off, so there the
/// call runs inline.
fn blocking_io<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current().map(|h| h.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(f),
        _ => f(),
    }
}

/// One session's acquisition worker
pub struct AcquisitionLoop {
    source: Box<dyn FrameSource>,
    sink: RecordingSink,
    format: FrameFormat,
    settings: LoopSettings,
    label: String,
    started: Instant,
    started_at: DateTime<Local>,
    sequence: u64,
    misses: u32,
    status: watch::Sender<LoopStatus>,
    cancel: CancellationToken,
}

impl AcquisitionLoop {
    /// Prepare a loop for a session; the session clock starts now.
    pub fn new(
        label: &str,
        source: Box<dyn FrameSource>,
        sink: RecordingSink,
        format: FrameFormat,
        settings: LoopSettings,
    ) -> Self {
        let (status, _) = watch::channel(LoopStatus::running(0));
        Self {
            source,
            sink,
            format,
            settings,
            label: label.to_string(),
            started: Instant::now(),
            started_at: Local::now(),
            sequence: 0,
            misses: 0,
            status,
            cancel: CancellationToken::new(),
        }
    }

    /// Receiver for the status snapshots the loop publishes
    pub fn subscribe(&self) -> watch::Receiver<LoopStatus> {
        self.status.subscribe()
    }

    /// Token that stops the loop when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Run until cancelled or a fault occurs
    pub async fn run(mut self) -> LoopOutcome {
        info!(label = %self.label, path = %self.sink.path().display(), "Data collection started");

        let mut failure = self.collect().await.err();
        if let Some(e) = &failure {
            error!(label = %self.label, "Data collection error: {}", e);
            self.cancel.cancel();
        }
        if let Err(e) = self.sink.close() {
            error!("Failed to close '{}': {}", self.sink.path().display(), e);
            failure.get_or_insert(e);
        }

        let state = if failure.is_some() { LoopState::Failed } else { LoopState::Stopped };
        let elapsed = self.started.elapsed().as_secs_f64();
        let summary = SessionSummary {
            label: self.label.clone(),
            path: self.sink.path().to_path_buf(),
            started_at: self.started_at,
            field_count: self.sink.field_count(),
            records: self.sequence,
            elapsed_seconds: elapsed,
            state,
            failure: failure.map(|e| e.to_string()),
        };

        match write_manifest(&summary) {
            Ok(path) => debug!("Session manifest written to '{}'", path.display()),
            Err(e) => warn!("Failed to write session manifest: {}", e),
        }

        info!(
            "Data collection {}. Total {} data points collected. Elapsed time: {:.1} seconds",
            state, self.sequence, elapsed
        );
        self.status.send_replace(LoopStatus { state, records: self.sequence });

        LoopOutcome {
            source: self.source,
            summary,
        }
    }

    async fn collect(&mut self) -> Result<()> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(());
            }

            let frame = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(()),
                frame = self.source.read_line(self.settings.read_timeout) => frame?,
            };
            self.record(frame)?;

            let deadline = next_read_at(self.started, self.sequence, self.settings.tick_period);
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep_until(deadline) => {}
            }
        }
    }

    fn record(&mut self, frame: Option<String>) -> Result<()> {
        let fields = frame.map(|line| self.format.parse(&line)).unwrap_or_default();
        if fields.is_empty() {
            return self.missed();
        }
        self.misses = 0;

        let record = Record::now(&self.label, self.started.elapsed(), fields);
        let sink = &mut self.sink;
        blocking_io(|| sink.append(&record))?;
        self.sequence += 1;
        self.status.send_replace(LoopStatus::running(self.sequence));

        if progress_due(self.sequence, self.settings.progress_interval) {
            info!(
                "Data points collected: {}, Elapsed time: {:.1} seconds",
                self.sequence, record.elapsed_seconds
            );
        }
        Ok(())
    }

    fn missed(&mut self) -> Result<()> {
        self.misses += 1;
        debug!("No data this tick ({} in a row)", self.misses);

        let limit = self.settings.max_consecutive_misses;
        if limit > 0 && self.misses >= limit {
            return Err(SensorError::NoData(format!(
                "{} consecutive reads from {} returned nothing",
                self.misses,
                self.source.name()
            )));
        }
        Ok(())
    }
}
