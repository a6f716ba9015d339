//! HTTP client wrapper for streaming a URL to a fixed target path.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT, DOWNLOAD_BUFFER_BYTES};
use super::error::DownloadError;
use crate::user_agent;

/// Builds the `reqwest` client shared by resolution and downloads.
///
/// `timeout` bounds each whole request; the connect phase is capped at
/// [`CONNECT_TIMEOUT`].
///
/// # Errors
///
/// Returns the builder error if the TLS backend cannot be initialized.
pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(timeout.min(CONNECT_TIMEOUT))
        .timeout(timeout)
        .gzip(true)
        .user_agent(user_agent::default_user_agent())
        .build()
}

/// HTTP client for downloading files with streaming support.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Wraps an existing client.
    #[must_use]
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Creates a client with the given per-request timeout.
    ///
    /// # Errors
    ///
    /// See [`build_client`].
    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self::from_client(build_client(timeout)?))
    }

    /// Downloads `url` into `target`, replacing any existing file.
    ///
    /// The body is streamed through a 1 MiB write buffer. On any error, and
    /// when the body turns out empty, the target file is removed.
    ///
    /// # Returns
    ///
    /// Number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if:
    /// - The URL is invalid
    /// - The request fails (network error, timeout)
    /// - The server answers with anything but 200
    /// - Writing to disk fails
    /// - No bytes were written
    #[instrument(skip(self), fields(url = %url, path = %target.display()))]
    pub async fn download_to_path(&self, url: &str, target: &Path) -> Result<u64, DownloadError> {
        debug!("starting download");

        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::from_reqwest(url, e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        let file = File::create(target)
            .await
            .map_err(|e| DownloadError::io(target, e))?;

        let bytes_written = match stream_to_file(file, response, url, target).await {
            Ok(0) => {
                remove_partial(target).await;
                return Err(DownloadError::empty_output(target));
            }
            Ok(bytes) => bytes,
            Err(e) => {
                remove_partial(target).await;
                return Err(e);
            }
        };

        if file_size(target).await == 0 {
            remove_partial(target).await;
            return Err(DownloadError::empty_output(target));
        }

        info!(bytes = bytes_written, "download complete");
        Ok(bytes_written)
    }
}

/// Streams response body to file, returning bytes written.
async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::with_capacity(DOWNLOAD_BUFFER_BYTES, file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::from_reqwest(url, e))?;
        if chunk.is_empty() {
            continue;
        }

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}

/// Size of `path` in bytes, 0 when it is missing.
pub(crate) async fn file_size(path: &Path) -> u64 {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.len())
        .unwrap_or(0)
}

/// Best-effort removal of a partial or empty target.
pub(crate) async fn remove_partial(path: &Path) {
    if tokio::fs::remove_file(path).await.is_ok() {
        debug!(path = %path.display(), "removed partial file");
    }
}
