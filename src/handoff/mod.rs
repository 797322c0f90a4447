//! # Hand-off Module
//!
//! Seams to the services a finished session is passed on to.
//!
//! This module handles:
//! - Uploading a completed session file ([`Uploader`], local [`LocalArchive`])
//! - Prompt-based analysis of readings ([`InferenceService`])
//! - Delivering text notifications ([`Notifier`], [`LogNotifier`])
//! - Building plain-text summaries from recorded data
//!
//! Hosted storage, model and chat back-ends implement these traits outside
//! this crate.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::acquisition::SessionSummary;
use crate::error::{Result, SensorError};

/// Follow-up prompt sent with the first analysis
pub const INTERPRETATION_PROMPT: &str = "Based on the given gas analysis output, which odors are dominant in the environment and what kind of threat do they pose to human health? Also specify the sources and effects of the odors.\n\n";

/// Stores a completed session file somewhere durable
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Returns the object key the file was stored under
    async fn upload(&self, path: &Path) -> Result<String>;
}

/// Free text in, free text out
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InferenceService: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Delivers a message to the operator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<()>;
}

/// Copies session files into a local archive directory, keyed by file name
#[derive(Debug, Clone)]
pub struct LocalArchive {
    dir: PathBuf,
}

impl LocalArchive {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl Uploader for LocalArchive {
    async fn upload(&self, path: &Path) -> Result<String> {
        let key = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SensorError::Handoff(format!("No file name in {}", path.display())))?
            .to_string();

        if !tokio::fs::try_exists(path).await? {
            return Err(SensorError::Handoff(format!("File not found: {}", path.display())));
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::copy(path, self.dir.join(&key)).await?;

        info!("{} successfully uploaded → {}/{}", path.display(), self.dir.display(), key);
        Ok(key)
    }
}

/// Writes notifications to the application log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        info!(target: "notification", "{}", message);
        Ok(())
    }
}

/// Measurement fields of the last row in a session file
///
/// # Errors
///
/// Returns error if the file cannot be read as CSV.
pub fn last_reading(path: &Path) -> Result<Option<Vec<String>>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut last = None;
    for row in reader.records() {
        last = Some(row?);
    }
    Ok(last.map(|row| row.iter().skip(3).map(str::to_string).collect()))
}

/// Plain-text summary of a session, suitable as a notification or prompt
pub fn summarize(summary: &SessionSummary, last: Option<&[String]>) -> String {
    let mut text = format!(
        "Session '{}' {} after {:.1} seconds with {} records ({} features).\nFile: {}",
        summary.label,
        summary.state,
        summary.elapsed_seconds,
        summary.records,
        summary.field_count,
        summary.path.display()
    );
    if let Some(reason) = &summary.failure {
        text.push_str(&format!("\nFailure: {}", reason));
    }
    if let Some(fields) = last {
        text.push_str(&format!("\nLast reading: {}", fields.join(", ")));
    }
    text
}

/// Result of a two-stage threat assessment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assessment {
    /// Model output for the raw readings
    pub analysis: String,
    /// Model interpretation of that output
    pub interpretation: String,
}

/// Analyse gas readings, interpret the analysis, notify with both
///
/// # Errors
///
/// Returns the first error from either service; nothing is sent if
/// generation fails.
pub async fn assess_and_notify(
    inference: &dyn InferenceService,
    notifier: &dyn Notifier,
    readings: &str,
) -> Result<Assessment> {
    let analysis = inference.generate(readings).await?;
    let interpretation = inference
        .generate(&format!("{}{}", INTERPRETATION_PROMPT, analysis))
        .await?;

    notifier
        .notify(&format!("Odor Detection:\n{}\n\nComment:\n{}", analysis, interpretation))
        .await?;

    Ok(Assessment { analysis, interpretation })
}
