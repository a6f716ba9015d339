//! Run settings loaded from an INI-style configuration file.
//!
//! ```text
//! [options]
//! rep_count = 3        ; attempts per item (required)
//! timeout = 60         ; per-request timeout in seconds
//! concurrency = 10     ; concurrent downloads
//!
//! [download_info]
//! filepath = ./downloads   ; download root (required)
//!
//! [api]
//! endpoint = https://su.tuanyougou.com/query
//!
//! [transcode]
//! ffmpeg = /usr/bin/ffmpeg
//! ```
//!
//! The file is decoded with [`crate::input::decode_text`], so non-UTF-8
//! encodings are accepted.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::input::decode_text;
use crate::resolver::ResolveMode;

/// Default config file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.ini";

/// Default extraction endpoint.
pub const DEFAULT_RESOLVE_ENDPOINT: &str = "https://su.tuanyougou.com/query";

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Concurrency used in media mode when the file does not set one.
pub const DEFAULT_MEDIA_CONCURRENCY: usize = 10;

/// Concurrency used in audio mode when the file does not set one.
pub const DEFAULT_AUDIO_CONCURRENCY: usize = 1;

/// Errors raised while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A line is neither a section header, a comment, nor `key = value`.
    #[error("invalid config syntax on line {line}: {message}")]
    Syntax {
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        message: String,
    },

    /// A value failed to parse or is out of range.
    #[error("invalid value '{value}' for `{key}`: expected {expected}")]
    InvalidValue {
        /// Dotted key (`section.key`).
        key: String,
        /// Raw value as written.
        value: String,
        /// Description of accepted values.
        expected: &'static str,
    },

    /// A required key is absent.
    #[error("missing required config key `{key}`")]
    MissingKey {
        /// Dotted key (`section.key`).
        key: &'static str,
    },
}

/// Settings consumed by the resolver, workers, and scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Attempts per work item, including the first one.
    pub retry_count: u32,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Semaphore size; `None` means the mode default.
    pub concurrency: Option<usize>,
    /// Absolute download root.
    pub download_root: PathBuf,
    /// Resolution API endpoint.
    pub resolve_endpoint: String,
    /// Explicit transcoder binary, if configured.
    pub ffmpeg: Option<PathBuf>,
}

impl Settings {
    /// Creates settings with defaults for everything but the two required values.
    #[must_use]
    pub fn new(download_root: impl Into<PathBuf>, retry_count: u32) -> Self {
        Self {
            retry_count,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            concurrency: None,
            download_root: download_root.into(),
            resolve_endpoint: DEFAULT_RESOLVE_ENDPOINT.to_string(),
            ffmpeg: None,
        }
    }

    /// Loads settings from `path`, detecting the file encoding.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, or any parse
    /// error from [`Settings::parse_str`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let raw = decode_text(&bytes);
        debug!(path = %path.display(), "loaded config file");
        Self::parse_str(&raw)
    }

    /// Parses INI text into settings.
    ///
    /// Section and key names are case-insensitive. Full-line comments start
    /// with `#` or `;`. Unknown sections and keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Syntax`], [`ConfigError::InvalidValue`], or
    /// [`ConfigError::MissingKey`].
    pub fn parse_str(raw: &str) -> Result<Self, ConfigError> {
        let mut section = String::new();
        let mut retry_count = None;
        let mut timeout = None;
        let mut concurrency = None;
        let mut download_root = None;
        let mut resolve_endpoint = None;
        let mut ffmpeg = None;

        for (line_index, raw_line) in raw.lines().enumerate() {
            let line = raw_line.trim().trim_start_matches('\u{feff}');
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                let Some(name) = header.strip_suffix(']') else {
                    return Err(ConfigError::Syntax {
                        line: line_index + 1,
                        message: "unterminated section header".to_string(),
                    });
                };
                section = name.trim().to_ascii_lowercase();
                continue;
            }

            let Some((raw_key, raw_value)) = line.split_once('=').or_else(|| line.split_once(':'))
            else {
                return Err(ConfigError::Syntax {
                    line: line_index + 1,
                    message: "expected key = value".to_string(),
                });
            };
            let key = raw_key.trim().to_ascii_lowercase();
            let value = unquote(raw_value.trim());

            match (section.as_str(), key.as_str()) {
                ("options", "rep_count") => {
                    retry_count = Some(parse_ranged(
                        "options.rep_count",
                        value,
                        1,
                        20,
                        "integer 1..=20",
                    )?);
                }
                ("options", "timeout") => {
                    timeout = Some(parse_ranged(
                        "options.timeout",
                        value,
                        1,
                        3600,
                        "seconds 1..=3600",
                    )?);
                }
                ("options", "concurrency") => {
                    concurrency = Some(parse_ranged(
                        "options.concurrency",
                        value,
                        1,
                        100,
                        "integer 1..=100",
                    )?);
                }
                ("download_info", "filepath") => {
                    if value.is_empty() {
                        return Err(invalid("download_info.filepath", value, "a directory path"));
                    }
                    download_root = Some(PathBuf::from(value));
                }
                ("api", "endpoint") => {
                    Url::parse(value)
                        .map_err(|_| invalid("api.endpoint", value, "an absolute URL"))?;
                    resolve_endpoint = Some(value.to_string());
                }
                ("transcode", "ffmpeg") => {
                    if !value.is_empty() {
                        ffmpeg = Some(PathBuf::from(value));
                    }
                }
                (section, key) => {
                    debug!(section, key, "ignoring unknown config key");
                }
            }
        }

        let retry_count = retry_count.ok_or(ConfigError::MissingKey {
            key: "options.rep_count",
        })?;
        let download_root = download_root.ok_or(ConfigError::MissingKey {
            key: "download_info.filepath",
        })?;
        let download_root = std::path::absolute(&download_root).map_err(|_| {
            invalid(
                "download_info.filepath",
                &download_root.to_string_lossy(),
                "a directory path",
            )
        })?;

        Ok(Self {
            retry_count: u32::try_from(retry_count).unwrap_or(u32::MAX),
            timeout: Duration::from_secs(timeout.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            concurrency: concurrency.map(|c| usize::try_from(c).unwrap_or(DEFAULT_MEDIA_CONCURRENCY)),
            download_root,
            resolve_endpoint: resolve_endpoint
                .unwrap_or_else(|| DEFAULT_RESOLVE_ENDPOINT.to_string()),
            ffmpeg,
        })
    }

    /// Semaphore size for `mode`, falling back to the mode default.
    #[must_use]
    pub fn effective_concurrency(&self, mode: ResolveMode) -> usize {
        self.concurrency.unwrap_or(match mode {
            ResolveMode::Media => DEFAULT_MEDIA_CONCURRENCY,
            ResolveMode::Audio => DEFAULT_AUDIO_CONCURRENCY,
        })
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2
            && let Some(inner) = value.strip_prefix(quote).and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

fn parse_ranged(
    key: &'static str,
    value: &str,
    min: u64,
    max: u64,
    expected: &'static str,
) -> Result<u64, ConfigError> {
    let parsed = value.parse::<u64>().map_err(|_| invalid(key, value, expected))?;
    if !(min..=max).contains(&parsed) {
        return Err(invalid(key, value, expected));
    }
    Ok(parsed)
}

fn invalid(key: &str, value: &str, expected: &'static str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected,
    }
}
