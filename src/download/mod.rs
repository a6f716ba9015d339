//! Download side of a batch: streaming HTTP, transcoding, retries.
//!
//! # Features
//!
//! - Streaming downloads through a 1 MiB write buffer
//! - Transcode fallback through an external tool behind the [`Transcoder`] trait
//! - Bounded retries with a fixed backoff for transient failures
//! - Batch-wide filename reservations so concurrent items never share a path
//!
//! # Example
//!
//! ```no_run
//! use clipgrab_core::download::HttpClient;
//! use std::path::Path;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::with_timeout(Duration::from_secs(60))?;
//! let bytes = client
//!     .download_to_path("https://example.com/clip.mp4", Path::new("./clip_00001.mp4"))
//!     .await?;
//! println!("Downloaded {bytes} bytes");
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod error;
pub mod filename;
mod retry;
pub mod transcode;
mod worker;

pub use client::{HttpClient, build_client};
pub use constants::{CONNECT_TIMEOUT, DOWNLOAD_BUFFER_BYTES};
pub use error::{DownloadError, STDERR_TAIL_CHARS};
pub use retry::{
    DEFAULT_BACKOFF, DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_error,
};
pub use transcode::{FFMPEG_BINARY, FfmpegTranscoder, Transcoder};
pub use worker::DownloadWorker;

// No module-local Result aliases; use `Result<T, DownloadError>` explicitly.
