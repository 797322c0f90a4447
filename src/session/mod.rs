//! # Session Module
//!
//! Lifecycle facade over the serial channel, the recording sink and the
//! acquisition loop.
//!
//! ```text
//! connect ──► start(label) ──► [loop running] ──► stop() ──► close()
//!                   │                 │
//!                   │                 └── fault ──► Failed (reaped by stop)
//!                   └── NoData / Io ──► no session created
//! ```
//!
//! A controller is an ordinary owned value; independent controllers (for
//! example one per test) do not share any state.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::acquisition::{AcquisitionLoop, LoopOutcome, LoopSettings, LoopState, LoopStatus, SessionSummary};
use crate::error::{Result, SensorError};
use crate::frame::FrameFormat;
use crate::recording::RecordingSink;
use crate::serial::{FrameSource, SerialChannel};

/// Everything a controller needs to run sessions
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub format: FrameFormat,
    pub read_timeout: Duration,
    pub tick_period: Duration,
    pub progress_interval: u64,
    pub max_consecutive_misses: u32,
    /// Upper bound on waiting for the loop in `stop()`
    pub join_timeout: Duration,
    /// Directory for session files when no path is given to `start()`
    pub output_dir: PathBuf,
}

impl Default for SessionSettings {
    fn default() -> Self {
        crate::config::Config::default().session_settings()
    }
}

impl SessionSettings {
    fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            read_timeout: self.read_timeout,
            tick_period: self.tick_period,
            progress_interval: self.progress_interval,
            max_consecutive_misses: self.max_consecutive_misses,
        }
    }
}

/// `<dir>/sensor_data_<label>_<YYYYmmdd_HHMMSS>.csv`
///
/// Characters outside `[A-Za-z0-9_-]` in the label are replaced with `_`.
pub fn default_session_path(dir: &Path, label: &str, started_at: DateTime<Local>) -> PathBuf {
    let label: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    dir.join(format!("sensor_data_{}_{}.csv", label, started_at.format("%Y%m%d_%H%M%S")))
}

struct ActiveSession {
    label: String,
    path: PathBuf,
    started_at: DateTime<Local>,
    field_count: usize,
    handle: JoinHandle<LoopOutcome>,
    cancel: CancellationToken,
    status: watch::Receiver<LoopStatus>,
}

/// Public lifecycle API: connect, start, stop, close
pub struct SessionController {
    settings: SessionSettings,
    /// Open channel while no session has it on loan
    source: Option<Box<dyn FrameSource>>,
    active: Option<ActiveSession>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("connected", &self.is_connected())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl SessionController {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            source: None,
            active: None,
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Open the sensor port and make it the controller's channel
    ///
    /// # Errors
    ///
    /// - [`SensorError::AlreadyCollecting`] while a session is running
    /// - [`SensorError::Connection`] if the port cannot be opened; any
    ///   previous channel is already closed by then
    pub async fn connect(&mut self, port: &str, baud_rate: u32) -> Result<()> {
        self.ensure_not_collecting().await?;
        // Ports open exclusively, so the old handle must go before reopening
        if let Some(mut previous) = self.source.take() {
            previous.close();
        }
        let channel = SerialChannel::open(port, baud_rate)?;
        self.source = Some(Box::new(channel));
        Ok(())
    }

    /// Use an already-open frame source as the controller's channel
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::AlreadyCollecting`] while a session is running.
    pub async fn attach(&mut self, source: Box<dyn FrameSource>) -> Result<()> {
        self.ensure_not_collecting().await?;
        self.install(source);
        Ok(())
    }

    /// Start a collection session
    ///
    /// Reads one frame to learn the field count, creates the session file
    /// and hands the channel to a background acquisition loop. When `path` is
    /// `None` the file goes to [`default_session_path`].
    ///
    /// # Returns
    ///
    /// * `Result<PathBuf>` - Path of the session file
    ///
    /// # Errors
    ///
    /// - [`SensorError::AlreadyCollecting`] if a session is running
    /// - [`SensorError::NotConnected`] if no channel is open
    /// - [`SensorError::NoData`] if the first read yields no fields (no file is created)
    /// - [`SensorError::Read`] if the first read faults
    /// - [`SensorError::Io`] if the session file cannot be created
    pub async fn start(&mut self, label: &str, path: Option<PathBuf>) -> Result<PathBuf> {
        self.ensure_not_collecting().await?;
        let source = self.source.as_mut().ok_or(SensorError::NotConnected)?;

        let first = source.read_line(self.settings.read_timeout).await?;
        let fields = first.map(|line| self.settings.format.parse(&line)).unwrap_or_default();
        if fields.is_empty() {
            warn!("Cannot read data from sensor! Check the connection.");
            return Err(SensorError::NoData(format!("{} sent no frame to start from", source.name())));
        }

        let started_at = Local::now();
        let path = path.unwrap_or_else(|| default_session_path(&self.settings.output_dir, label, started_at));
        let sink = RecordingSink::open(&path, fields.len())?;

        let source = self.source.take().ok_or(SensorError::NotConnected)?;
        let worker = AcquisitionLoop::new(label, source, sink, self.settings.format.clone(), self.settings.loop_settings());
        let status = worker.subscribe();
        let cancel = worker.cancel_token();
        let started_at = worker.started_at();
        let handle = tokio::spawn(worker.run());

        info!("Data collection started: label '{}', {} features", label, fields.len());
        self.active = Some(ActiveSession {
            label: label.to_string(),
            path: path.clone(),
            started_at,
            field_count: fields.len(),
            handle,
            cancel,
            status,
        });
        Ok(path)
    }

    /// Stop the running session
    ///
    /// Requests cancellation, waits up to the join timeout for the loop to
    /// finish, and hands the channel back to the controller. A loop that
    /// does not finish in time is aborted; its channel is dropped with it.
    ///
    /// # Returns
    ///
    /// * `None` - nothing to stop
    /// * `Some(summary)` - the completed session, `Stopped` or `Failed`
    pub async fn stop(&mut self) -> Option<SessionSummary> {
        let Some(active) = self.active.take() else {
            info!("Nothing to stop");
            return None;
        };

        active.cancel.cancel();
        let ActiveSession { label, path, started_at, field_count, mut handle, status, .. } = active;
        let last = *status.borrow();

        let summary = match tokio::time::timeout(self.settings.join_timeout, &mut handle).await {
            Ok(Ok(outcome)) => {
                self.source = Some(outcome.source);
                outcome.summary
            }
            Ok(Err(e)) => {
                error!("Acquisition task for '{}' ended abnormally: {}", label, e);
                abandoned(label, path, started_at, field_count, last, format!("acquisition task failed: {}", e))
            }
            Err(_) => {
                handle.abort();
                warn!(
                    "Acquisition loop for '{}' did not stop within {:?}; aborted and disconnected",
                    label, self.settings.join_timeout
                );
                abandoned(label, path, started_at, field_count, last, "acquisition loop did not stop in time".to_string())
            }
        };

        info!("Collected data: {} ({} records, {})", summary.path.display(), summary.records, summary.state);
        Some(summary)
    }

    /// Stop any session and release the channel. Safe to call repeatedly.
    pub async fn close(&mut self) -> Option<SessionSummary> {
        let summary = self.stop().await;
        if let Some(mut source) = self.source.take() {
            source.close();
        }
        summary
    }

    /// Wait until the running session reaches `Stopped` or `Failed`
    ///
    /// Returns `None` immediately when no session exists.
    pub async fn wait_finished(&mut self) -> Option<LoopState> {
        let active = self.active.as_mut()?;
        let state = match active.status.wait_for(|s| s.state.is_terminal()).await {
            Ok(status) => status.state,
            // Sender gone without a terminal state: the task died
            Err(_) => LoopState::Failed,
        };
        Some(state)
    }

    /// Latest published loop status (`Idle` when no session exists)
    pub fn status(&self) -> LoopStatus {
        self.active
            .as_ref()
            .map(|a| *a.status.borrow())
            .unwrap_or(LoopStatus::IDLE)
    }

    pub fn state(&self) -> LoopState {
        self.status().state
    }

    /// A channel is open, either held here or on loan to a session
    pub fn is_connected(&self) -> bool {
        self.source.is_some() || self.active.is_some()
    }

    /// A session exists and has not reached a terminal state
    pub fn is_collecting(&self) -> bool {
        self.state() == LoopState::Running
    }

    /// Path of the running session's file
    pub fn current_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|a| a.path.as_path())
    }

    /// Reject while running; reap a session that already ended on its own
    async fn ensure_not_collecting(&mut self) -> Result<()> {
        if self.is_collecting() {
            return Err(SensorError::AlreadyCollecting);
        }
        if self.active.is_some() {
            self.stop().await;
        }
        Ok(())
    }

    fn install(&mut self, source: Box<dyn FrameSource>) {
        if let Some(mut previous) = self.source.replace(source) {
            previous.close();
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            active.cancel.cancel();
        }
    }
}

fn abandoned(
    label: String,
    path: PathBuf,
    started_at: DateTime<Local>,
    field_count: usize,
    last: LoopStatus,
    reason: String,
) -> SessionSummary {
    let elapsed = (Local::now() - started_at).num_milliseconds().max(0) as f64 / 1000.0;
    SessionSummary {
        label,
        path,
        started_at,
        field_count,
        records: last.records,
        elapsed_seconds: elapsed,
        state: LoopState::Failed,
        failure: Some(reason),
    }
}
