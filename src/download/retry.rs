//! Retry logic with fixed backoff for download attempts.
//!
//! When an attempt fails, the error is classified into a [`FailureType`]:
//! - [`FailureType::Transient`] - connection-class errors and timeouts; retried after the backoff sleep
//! - [`FailureType::Unsuccessful`] - the attempt completed but its result was rejected
//!   (non-200 status, empty output, transcoder exit code); retried immediately
//! - [`FailureType::Permanent`] - retrying cannot help; the item fails at once
//!
//! The [`RetryPolicy`] then decides whether another attempt is made.
//!
//! # Example
//!
//! ```
//! use clipgrab_core::download::{DownloadError, RetryDecision, RetryPolicy, classify_error};
//!
//! let policy = RetryPolicy::with_max_attempts(3);
//! let error = DownloadError::timeout("https://example.com/clip.mp4");
//!
//! match policy.should_retry(classify_error(&error), 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Retrying in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

use std::time::Duration;

use tracing::{debug, instrument};

use super::DownloadError;

/// Default maximum attempts.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default sleep before retrying a transient failure.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);

/// Classification of download failure types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Connection, connector, or timeout error. Retried after the backoff.
    Transient,

    /// The attempt ran to completion but produced no usable result.
    /// Retried without sleeping.
    Unsuccessful,

    /// Failure that won't succeed regardless of retries.
    ///
    /// Examples: invalid URL, unwritable target, missing transcoder.
    Permanent,
}

/// Decision on whether to retry a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Bounded retry with a fixed backoff for transient failures.
///
/// `max_attempts` counts the first attempt, so a policy of 3 makes at most
/// three attempts. No sleep follows the final attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Sleep before retrying a transient failure.
    backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy.
    ///
    /// `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Creates a policy with a custom `max_attempts` and the default backoff.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self::new(max_attempts, DEFAULT_BACKOFF)
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the transient-failure backoff.
    #[must_use]
    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Determines whether to retry a failed attempt.
    ///
    /// `attempt` is the attempt number that just failed (1-indexed).
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        let delay = match failure_type {
            FailureType::Permanent => {
                return RetryDecision::DoNotRetry {
                    reason: "permanent failure - retry would not help".to_string(),
                };
            }
            FailureType::Transient => self.backoff,
            FailureType::Unsuccessful => Duration::ZERO,
        };

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }
}

/// Classifies a download error into a failure type for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | Timeout | Transient |
/// | Network (builder) | Permanent |
/// | Network (other) | Transient |
/// | HttpStatus | Unsuccessful |
/// | EmptyOutput | Unsuccessful |
/// | Transcode | Unsuccessful |
/// | Io | Permanent |
/// | InvalidUrl | Permanent |
/// | TranscoderUnavailable | Permanent |
#[instrument]
pub fn classify_error(error: &DownloadError) -> FailureType {
    match error {
        DownloadError::Timeout { .. } => FailureType::Transient,

        DownloadError::Network { source, .. } => {
            if source.is_builder() {
                FailureType::Permanent
            } else {
                FailureType::Transient
            }
        }

        DownloadError::HttpStatus { .. }
        | DownloadError::EmptyOutput { .. }
        | DownloadError::Transcode { .. } => FailureType::Unsuccessful,

        DownloadError::Io { .. }
        | DownloadError::InvalidUrl { .. }
        | DownloadError::TranscoderUnavailable { .. } => FailureType::Permanent,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ==================== RetryPolicy Tests ====================

    #[test]
    fn test_retry_policy_default_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.backoff(), Duration::from_secs(2));
    }

    #[test]
    fn test_retry_policy_max_attempts_minimum_is_one() {
        let policy = RetryPolicy::with_max_attempts(0);
        assert_eq!(policy.max_attempts(), 1);
    }

    #[test]
    fn test_transient_retry_uses_backoff() {
        let policy = RetryPolicy::new(3, Duration::from_millis(250));
        assert_eq!(
            policy.should_retry(FailureType::Transient, 1),
            RetryDecision::Retry {
                delay: Duration::from_millis(250),
                attempt: 2
            }
        );
    }

    #[test]
    fn test_unsuccessful_retry_is_immediate() {
        let policy = RetryPolicy::with_max_attempts(3);
        assert_eq!(
            policy.should_retry(FailureType::Unsuccessful, 2),
            RetryDecision::Retry {
                delay: Duration::ZERO,
                attempt: 3
            }
        );
    }

    #[test]
    fn test_no_retry_after_last_attempt() {
        let policy = RetryPolicy::with_max_attempts(3);
        match policy.should_retry(FailureType::Transient, 3) {
            RetryDecision::DoNotRetry { reason } => assert!(reason.contains("exhausted")),
            other => panic!("expected DoNotRetry, got {other:?}"),
        }
    }

    #[test]
    fn test_permanent_never_retried() {
        let policy = RetryPolicy::with_max_attempts(5);
        match policy.should_retry(FailureType::Permanent, 1) {
            RetryDecision::DoNotRetry { reason } => assert!(reason.contains("permanent")),
            other => panic!("expected DoNotRetry, got {other:?}"),
        }
    }

    #[test]
    fn test_single_attempt_policy_never_retries() {
        let policy = RetryPolicy::with_max_attempts(1);
        assert!(matches!(
            policy.should_retry(FailureType::Transient, 1),
            RetryDecision::DoNotRetry { .. }
        ));
    }

    // ==================== Classification Tests ====================

    #[test]
    fn test_classify_timeout_is_transient() {
        let error = DownloadError::timeout("https://x/a.mp4");
        assert_eq!(classify_error(&error), FailureType::Transient);
    }

    #[test]
    fn test_classify_rejected_results_are_unsuccessful() {
        assert_eq!(
            classify_error(&DownloadError::http_status("https://x/a.mp4", 404)),
            FailureType::Unsuccessful
        );
        assert_eq!(
            classify_error(&DownloadError::empty_output("/t/a.mp4")),
            FailureType::Unsuccessful
        );
        assert_eq!(
            classify_error(&DownloadError::transcode("/t/a.mp3", Some(1), "boom")),
            FailureType::Unsuccessful
        );
    }

    #[test]
    fn test_classify_local_problems_are_permanent() {
        assert_eq!(
            classify_error(&DownloadError::invalid_url("nope")),
            FailureType::Permanent
        );
        assert_eq!(
            classify_error(&DownloadError::io(
                "/t/a.mp4",
                std::io::Error::from(std::io::ErrorKind::PermissionDenied)
            )),
            FailureType::Permanent
        );
        assert_eq!(
            classify_error(&DownloadError::transcoder_unavailable(
                "ffmpeg",
                std::io::Error::from(std::io::ErrorKind::NotFound)
            )),
            FailureType::Permanent
        );
    }

    #[tokio::test]
    async fn test_classify_connection_refused_is_transient() {
        let Ok(listener) = std::net::TcpListener::bind("127.0.0.1:0") else {
            return;
        };
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let url = format!("http://127.0.0.1:{port}/a.mp4");
        let source = reqwest::Client::new().get(&url).send().await.unwrap_err();
        let error = DownloadError::from_reqwest(url, source);
        assert_eq!(classify_error(&error), FailureType::Transient);
    }
}
