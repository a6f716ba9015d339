//! Error types for the download module.
//!
//! Each variant carries enough context (URL or path) to be logged on its own;
//! [`super::classify_error`] decides what the retry loop does with it.

use std::path::PathBuf;

use thiserror::Error;

/// Maximum number of trailing transcoder stderr characters kept in errors.
pub const STDERR_TAIL_CHARS: usize = 400;

/// Errors that can occur during a single download or transcode attempt.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, reset, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-200 HTTP response.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error (create, write, stat).
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The attempt reported success but the target is missing or empty.
    #[error("no data written to {path}")]
    EmptyOutput {
        /// Target path that failed verification.
        path: PathBuf,
    },

    /// The transcoder ran and exited unsuccessfully.
    #[error("transcoder failed for {path} (exit {}): {stderr}", exit_label(.status))]
    Transcode {
        /// Target path.
        path: PathBuf,
        /// Exit code, `None` when killed by a signal.
        status: Option<i32>,
        /// Tail of the transcoder's stderr.
        stderr: String,
    },

    /// The transcoder binary could not be started.
    #[error("cannot run transcoder '{program}': {source}\n  Suggestion: install ffmpeg or set [transcode] ffmpeg in the config file")]
    TranscoderUnavailable {
        /// Program that was invoked.
        program: String,
        /// Spawn error.
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an empty-output error.
    pub fn empty_output(path: impl Into<PathBuf>) -> Self {
        Self::EmptyOutput { path: path.into() }
    }

    /// Creates a transcoder failure, keeping only the tail of `stderr`.
    pub fn transcode(path: impl Into<PathBuf>, status: Option<i32>, stderr: &str) -> Self {
        Self::Transcode {
            path: path.into(),
            status,
            stderr: stderr_tail(stderr),
        }
    }

    /// Creates a transcoder-unavailable error.
    pub fn transcoder_unavailable(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::TranscoderUnavailable {
            program: program.into(),
            source,
        }
    }

    /// Maps a reqwest error to `Timeout` or `Network`.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::timeout(url)
        } else {
            Self::network(url, source)
        }
    }
}

#[allow(clippy::ref_option)]
fn exit_label(status: &Option<i32>) -> String {
    status.map_or_else(|| "signal".to_string(), |code| code.to_string())
}

/// Last [`STDERR_TAIL_CHARS`] characters of `stderr`, trimmed.
fn stderr_tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    let len = trimmed.chars().count();
    if len <= STDERR_TAIL_CHARS {
        return trimmed.to_string();
    }
    let tail: String = trimmed.chars().skip(len - STDERR_TAIL_CHARS).collect();
    format!("...{tail}")
}
