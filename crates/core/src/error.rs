//! Error types shared by every stage of a transcode.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a single-file pipeline.
///
/// Soft failures (missing fonts, failed thumbnails, ...) never show up here;
/// they are recorded as [`Degradation`]s on the successful result instead.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// Invalid arguments or settings, detected before any process is spawned.
    #[error("Invalid settings: {reason}")]
    Validation { reason: String },

    /// Input file or scan directory does not exist.
    #[error("Not found: {path}")]
    NotFound { path: PathBuf },

    /// Output already exists and overwriting is disabled.
    #[error("Output already exists: {path}")]
    Conflict { path: PathBuf },

    /// The external tool could not be started at all.
    #[error("Failed to launch {program}: {source}")]
    ToolLaunch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The external tool ran but did not produce a usable output.
    #[error("{reason}")]
    ToolExecution {
        reason: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// The tool exceeded its maximum runtime and was killed.
    #[error("Process timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The run was cancelled by the caller.
    #[error("Cancelled")]
    Cancelled,

    /// ffprobe failed or returned unparseable output.
    #[error("Failed to probe media file: {reason}")]
    Probe { reason: String },

    /// I/O error outside of the tool itself.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranscodeError {
    /// Creates a validation error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Creates a tool execution error with captured diagnostics.
    pub fn execution_failed(
        reason: impl Into<String>,
        exit_code: Option<i32>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::ToolExecution {
            reason: reason.into(),
            exit_code,
            stderr: stderr.into(),
        }
    }

    /// Creates a probe error.
    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::Probe {
            reason: reason.into(),
        }
    }

    /// Whether the tool never started (as opposed to running and failing).
    pub fn is_launch_failure(&self) -> bool {
        matches!(self, Self::ToolLaunch { .. })
    }

    /// Coarse classification used in batch summaries.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::ToolLaunch { .. } => ErrorKind::ToolLaunch,
            Self::ToolExecution { .. } | Self::Probe { .. } | Self::Io(_) => {
                ErrorKind::ToolExecution
            }
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Captured stderr, if the tool got far enough to produce any.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::ToolExecution { stderr, .. } if !stderr.is_empty() => Some(stderr),
            _ => None,
        }
    }
}

/// Serializable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    ToolLaunch,
    ToolExecution,
    Timeout,
    Cancelled,
}

/// Feature that was skipped or reduced while still producing an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationKind {
    Watermark,
    Font,
    CustomArgs,
    Fade,
    Metadata,
    Thumbnails,
}

/// A soft failure attached to an otherwise successful result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Degradation {
    pub kind: DegradationKind,
    pub message: String,
}

impl Degradation {
    pub fn new(kind: DegradationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
