//! Failure taxonomy and per-item failure reports.
//!
//! Nothing a single link or work item does may abort a batch; every error is
//! folded into one of these values and handed back to the scheduler.

use std::fmt;
use std::path::PathBuf;

use crate::download::{DownloadError, FailureType, classify_error};

/// Where in the pipeline an item failed and why it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FailureKind {
    /// The link could not be turned into work items.
    Resolution,
    /// Every attempt failed with a retryable error.
    TransientExhausted,
    /// An error retrying cannot fix.
    Permanent,
    /// The transfer finished but left no usable file.
    Integrity,
    /// The target could not be created, written, or named.
    Filesystem,
}

impl FailureKind {
    /// Short human-readable label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Resolution => "resolution failed",
            Self::TransientExhausted => "retries exhausted",
            Self::Permanent => "permanent error",
            Self::Integrity => "empty output",
            Self::Filesystem => "filesystem error",
        }
    }

    /// Buckets the last error of a finished retry loop.
    #[must_use]
    pub fn from_download_error(error: &DownloadError) -> Self {
        match error {
            DownloadError::EmptyOutput { .. } => Self::Integrity,
            DownloadError::Io { .. } => Self::Filesystem,
            _ => match classify_error(error) {
                FailureType::Permanent => Self::Permanent,
                FailureType::Transient | FailureType::Unsuccessful => Self::TransientExhausted,
            },
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of a work item that did not produce a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    /// Truncated item label.
    pub label: String,
    /// Path the item was meant to be written to.
    pub target_path: PathBuf,
    /// Failure bucket.
    pub kind: FailureKind,
    /// Attempts made, including the first.
    pub attempts: u32,
    /// Last error message.
    pub message: String,
}

impl FailureReport {
    /// Creates a report from the last error of a retry loop.
    #[must_use]
    pub fn from_error(
        label: impl Into<String>,
        target_path: impl Into<PathBuf>,
        error: &DownloadError,
        attempts: u32,
    ) -> Self {
        Self {
            label: label.into(),
            target_path: target_path.into(),
            kind: FailureKind::from_download_error(error),
            attempts,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] download failed ({}, {} attempt(s)): {}",
            self.label, self.kind, self.attempts, self.message
        )
    }
}

impl std::error::Error for FailureReport {}
