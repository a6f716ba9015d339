//! Download worker: one work item, bounded retries, integrity check.
//!
//! The worker never returns an error type the caller has to unwind; every
//! failure ends as a [`FailureReport`].

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, instrument, warn};

use super::client::HttpClient;
use super::error::DownloadError;
use super::retry::{RetryDecision, RetryPolicy, classify_error};
use super::transcode::Transcoder;
use crate::failure::{FailureKind, FailureReport};
use crate::job::WorkItem;

/// Executes work items against the shared HTTP client or the transcoder.
///
/// One worker serves a whole batch; it is borrowed by every in-flight
/// download future.
pub struct DownloadWorker {
    client: HttpClient,
    transcoder: Arc<dyn Transcoder>,
    policy: RetryPolicy,
    announce: Mutex<()>,
}

impl fmt::Debug for DownloadWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadWorker")
            .field("transcoder", &self.transcoder.name())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl DownloadWorker {
    /// Creates a worker.
    #[must_use]
    pub fn new(client: HttpClient, transcoder: Arc<dyn Transcoder>, policy: RetryPolicy) -> Self {
        Self {
            client,
            transcoder,
            policy,
            announce: Mutex::new(()),
        }
    }

    /// Downloads one item while holding a slot of `slots`.
    ///
    /// Plain items are streamed to `target_path`; items flagged
    /// `requires_transcode` go through the transcoder. An attempt only counts
    /// as a success when the target exists with a non-zero size.
    ///
    /// # Errors
    ///
    /// Returns a [`FailureReport`] once the retry policy gives up.
    #[instrument(skip(self, item, slots), fields(label = %item.truncated_label))]
    pub async fn download(
        &self,
        item: &WorkItem,
        slots: &Semaphore,
    ) -> Result<PathBuf, FailureReport> {
        let Ok(_permit) = slots.acquire().await else {
            return Err(FailureReport {
                label: item.truncated_label.clone(),
                target_path: item.target_path.clone(),
                kind: FailureKind::Permanent,
                attempts: 0,
                message: "download slots closed".to_string(),
            });
        };

        {
            let _guard = self.announce.lock().await;
            info!(label = %item.truncated_label, "now downloading");
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            debug!(attempt, transcode = item.requires_transcode, "attempting download");

            let error = match self.attempt(item).await {
                Ok(()) => {
                    info!(path = %item.target_path.display(), attempts = attempt, "saved");
                    return Ok(item.target_path.clone());
                }
                Err(e) => e,
            };

            match self.policy.should_retry(classify_error(&error), attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => {
                    warn!(
                        label = %item.truncated_label,
                        attempt = next_attempt,
                        max_attempts = self.policy.max_attempts(),
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "retrying download"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(%reason, "not retrying download");
                    return Err(FailureReport::from_error(
                        item.truncated_label.clone(),
                        item.target_path.clone(),
                        &error,
                        attempt,
                    ));
                }
            }
        }
    }

    async fn attempt(&self, item: &WorkItem) -> Result<(), DownloadError> {
        if item.requires_transcode {
            self.transcoder
                .transcode(&item.source_url, &item.target_path)
                .await
        } else {
            self.client
                .download_to_path(&item.source_url, &item.target_path)
                .await
                .map(|_| ())
        }
    }
}
