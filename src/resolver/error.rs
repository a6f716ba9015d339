//! Error types for link resolution.
//!
//! Every variant is a per-link failure: the scheduler logs it, records the
//! link as unresolved, and moves on.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::download::filename::FilenameError;
use crate::failure::FailureKind;

/// Errors that can occur while turning a share link into work items.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// The configured endpoint cannot carry query parameters.
    #[error("invalid resolution endpoint '{endpoint}'\n  Suggestion: set [api] endpoint to an absolute http(s) URL")]
    InvalidEndpoint {
        /// Endpoint as configured.
        endpoint: String,
    },

    /// The request to the resolution API did not complete.
    #[error("resolution request failed: {reason}")]
    Request {
        /// Transport-level cause.
        reason: String,
    },

    /// The resolution API answered with something other than HTTP 200.
    #[error("resolution API returned HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The response body is not the expected JSON.
    #[error("malformed resolution response: {reason}")]
    Malformed {
        /// Parser message.
        reason: String,
    },

    /// The response has no `data` object.
    #[error("resolution response has no data\n  Suggestion: check that the link is a public share link")]
    MissingData,

    /// The record's `type` is neither a video nor an image gallery.
    #[error("unsupported work type {kind}")]
    UnsupportedType {
        /// The `type` value as received.
        kind: String,
    },

    /// No usable media URL was present in the record.
    #[error("no download URL in resolution record")]
    NoDownloadUrl,

    /// A target directory or filename could not be prepared.
    #[error("cannot prepare target {path}: {reason}")]
    Filesystem {
        /// Directory or file involved.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },
}

impl ResolveError {
    /// Creates a `Request` error.
    #[must_use]
    pub fn request(reason: impl Into<String>) -> Self {
        Self::Request {
            reason: reason.into(),
        }
    }

    /// Creates a `Malformed` error.
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    /// Creates a `Filesystem` error.
    #[must_use]
    pub fn filesystem(path: &Path, reason: impl Into<String>) -> Self {
        Self::Filesystem {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Failure taxonomy bucket for reporting.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Filesystem { .. } => FailureKind::Filesystem,
            _ => FailureKind::Resolution,
        }
    }
}

impl From<FilenameError> for ResolveError {
    fn from(error: FilenameError) -> Self {
        let path = match &error {
            FilenameError::DirectoryMissing { path }
            | FilenameError::Io { path, .. }
            | FilenameError::NoFreeSlot { path, .. } => path.clone(),
        };
        Self::Filesystem {
            path,
            reason: error.to_string(),
        }
    }
}
