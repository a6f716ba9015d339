//! Clipgrab Core Library
//!
//! Batch downloader for short-video share links: each link is resolved
//! through an extraction API into concrete media URLs, and the media is saved
//! under a dated directory tree (or as MP3 in audio mode).
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`config`] - INI settings file
//! - [`input`] - Encoding detection and link-list reading
//! - [`job`] - Work items and batch jobs
//! - [`resolver`] - Resolution client and pluggable resolution strategies
//! - [`download`] - Streaming downloads, transcoding, retries, file naming
//! - [`failure`] - Failure taxonomy and per-item reports
//! - [`batch`] - Two-phase batch scheduler

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod batch;
pub mod config;
pub mod download;
pub mod failure;
pub mod input;
pub mod job;
pub mod resolver;
#[cfg(test)]
pub mod test_support;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use batch::{BatchReport, BatchScheduler, EngineError, ItemOutcome, Progress, UnresolvedLink};
pub use config::{ConfigError, DEFAULT_CONFIG_PATH, Settings};
pub use download::{
    DEFAULT_MAX_RETRIES, DownloadError, DownloadWorker, FailureType, FfmpegTranscoder, HttpClient,
    RetryDecision, RetryPolicy, Transcoder, classify_error,
};
pub use failure::{FailureKind, FailureReport};
pub use input::{decode_text, read_links, read_links_file};
pub use job::{BatchJob, WorkItem, needs_transcode};
pub use resolver::{ResolutionClient, ResolutionData, ResolveError, ResolveMode, Resolver};
