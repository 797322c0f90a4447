//! Trait abstraction for sensor line sources to enable testing

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Source of line-delimited sensor frames
#[async_trait]
pub trait FrameSource: Send {
    /// Read one line, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` when the wait elapses or the line is blank, and an
    /// error only for a genuine fault on an open channel. Implementations must
    /// be cancel-safe: dropping the future must not lose buffered bytes.
    async fn read_line(&mut self, timeout: Duration) -> Result<Option<String>>;

    /// Release the underlying device. Calling this again is a no-op.
    fn close(&mut self);

    /// Whether the channel is still open
    fn is_open(&self) -> bool;

    /// Human-readable identity of the channel (e.g. the port path)
    fn name(&self) -> &str;
}
