//! Batch scheduler: resolve every link, then download every work item.
//!
//! A run has two phases:
//!
//! 1. **Resolution** - all links are fetched concurrently; records are then
//!    planned one by one in submission order so target names are reserved
//!    deterministically. Links that fail are logged and skipped.
//! 2. **Download** - one future per work item, capped by a shared semaphore.
//!    Outcomes are reported in completion order.
//!
//! Everything runs on the caller's task; nothing is spawned, so the futures
//! interleave cooperatively on a single execution context.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use clipgrab_core::{BatchScheduler, FfmpegTranscoder, ResolveMode, Settings};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::new("/data/clips", 3);
//! let scheduler = BatchScheduler::new(
//!     settings,
//!     ResolveMode::Media,
//!     Arc::new(FfmpegTranscoder::locate(None)),
//! )?;
//! let links = vec!["https://v.example.com/s/AbC".to_string()];
//! let report = scheduler.run(&links, |progress| println!("{progress}")).await?;
//! println!("Completed: {}, Failed: {}", report.completed(), report.failed());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::future::join_all;
use futures_util::stream::FuturesUnordered;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::config::Settings;
use crate::download::filename::NameReservations;
use crate::download::{
    DEFAULT_BACKOFF, DownloadWorker, HttpClient, RetryPolicy, Transcoder, build_client,
};
use crate::failure::{FailureKind, FailureReport};
use crate::job::BatchJob;
use crate::resolver::{PlanContext, ResolutionClient, ResolveError, ResolveMode, Resolver};

/// Minimum allowed concurrency value.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 100;

/// Errors that stop a batch before any item is attempted.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// The HTTP client could not be built.
    #[error("cannot create HTTP client: {source}")]
    Client {
        /// Builder error.
        #[source]
        source: reqwest::Error,
    },

    /// The resolution endpoint is unusable.
    #[error(transparent)]
    Resolver(#[from] ResolveError),
}

/// A link that produced no work items.
#[derive(Debug, Clone)]
pub struct UnresolvedLink {
    /// The submitted link.
    pub link: String,
    /// Why resolution failed.
    pub error: ResolveError,
}

impl UnresolvedLink {
    /// Failure class of the resolution error.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        self.error.kind()
    }
}

/// Final result of one work item.
#[derive(Debug, Clone)]
pub struct ItemOutcome {
    /// Truncated item label.
    pub label: String,
    /// Saved path, or the failure report.
    pub result: Result<PathBuf, FailureReport>,
}

impl ItemOutcome {
    /// True when the item was saved.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

impl fmt::Display for ItemOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            Ok(path) => write!(f, "{}", path.display()),
            Err(report) => write!(f, "{report}"),
        }
    }
}

/// One progress notification, emitted as each item finishes.
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    /// Items finished so far, including this one.
    pub done: usize,
    /// Items in the batch.
    pub total: usize,
    /// The item that just finished.
    pub outcome: &'a ItemOutcome,
}

impl fmt::Display for Progress<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] -> {}", self.done, self.total, self.outcome)
    }
}

/// Summary of a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Links handed to [`BatchScheduler::run`].
    pub links_submitted: usize,
    /// Links skipped during resolution, in submission order.
    pub unresolved: Vec<UnresolvedLink>,
    /// Item outcomes in completion order.
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchReport {
    /// Number of work items attempted.
    #[must_use]
    pub fn items_total(&self) -> usize {
        self.outcomes.len()
    }

    /// Items saved successfully.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Items that ended with a failure report.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.items_total() - self.completed()
    }

    /// Failure reports in completion order.
    pub fn failures(&self) -> impl Iterator<Item = &FailureReport> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().err())
    }
}

/// Runs batches of links with one set of settings.
#[derive(Debug)]
pub struct BatchScheduler {
    settings: Settings,
    mode: ResolveMode,
    concurrency: usize,
    backoff: Duration,
    transcoder: Arc<dyn Transcoder>,
    month_dir: Option<String>,
}

impl BatchScheduler {
    /// Creates a scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the effective
    /// concurrency for `mode` is outside 1-100.
    pub fn new(
        settings: Settings,
        mode: ResolveMode,
        transcoder: Arc<dyn Transcoder>,
    ) -> Result<Self, EngineError> {
        let concurrency = settings.effective_concurrency(mode);
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }

        debug!(concurrency, %mode, "creating batch scheduler");

        Ok(Self {
            settings,
            mode,
            concurrency,
            backoff: DEFAULT_BACKOFF,
            transcoder,
            month_dir: None,
        })
    }

    /// Overrides the sleep before retrying a transient failure.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Pins the per-month directory name instead of using the current month.
    #[must_use]
    pub fn with_month_dir(mut self, month_dir: impl Into<String>) -> Self {
        self.month_dir = Some(month_dir.into());
        self
    }

    /// Semaphore size used for downloads.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Resolution mode.
    #[must_use]
    pub fn mode(&self) -> ResolveMode {
        self.mode
    }

    /// Resolves and downloads `links`.
    ///
    /// `on_progress` is called once per work item, in completion order.
    /// Per-link and per-item failures are collected in the report; they never
    /// end the run early.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] only when the run cannot start: the HTTP
    /// client cannot be built or the resolution endpoint is invalid.
    #[instrument(skip(self, links, on_progress), fields(links = links.len(), mode = %self.mode))]
    pub async fn run<F>(
        &self,
        links: &[String],
        mut on_progress: F,
    ) -> Result<BatchReport, EngineError>
    where
        F: FnMut(&Progress<'_>),
    {
        let http = build_client(self.settings.timeout)
            .map_err(|source| EngineError::Client { source })?;
        let resolver = Resolver::new(
            ResolutionClient::new(http.clone(), &self.settings.resolve_endpoint)?,
            self.mode,
        );

        let (job, unresolved) = self.resolve_all(&resolver, links).await;
        info!(
            items = job.len(),
            unresolved = unresolved.len(),
            concurrency = self.concurrency,
            "resolution finished"
        );

        let worker = DownloadWorker::new(
            HttpClient::from_client(http),
            Arc::clone(&self.transcoder),
            RetryPolicy::new(self.settings.retry_count, self.backoff),
        );
        let slots = Semaphore::new(self.concurrency);

        let items = job.into_items();
        let total = items.len();
        let mut outcomes = Vec::with_capacity(total);

        {
            let worker = &worker;
            let slots = &slots;
            let mut pending: FuturesUnordered<_> = items
                .iter()
                .map(|item| async move {
                    ItemOutcome {
                        label: item.truncated_label.clone(),
                        result: worker.download(item, slots).await,
                    }
                })
                .collect();

            while let Some(outcome) = pending.next().await {
                let progress = Progress {
                    done: outcomes.len() + 1,
                    total,
                    outcome: &outcome,
                };
                debug!(
                    done = progress.done,
                    total,
                    success = outcome.is_success(),
                    "item finished"
                );
                on_progress(&progress);
                outcomes.push(outcome);
            }
        }

        let report = BatchReport {
            links_submitted: links.len(),
            unresolved,
            outcomes,
        };
        info!(
            completed = report.completed(),
            failed = report.failed(),
            unresolved = report.unresolved.len(),
            "batch finished"
        );
        Ok(report)
    }

    async fn resolve_all(
        &self,
        resolver: &Resolver,
        links: &[String],
    ) -> (BatchJob, Vec<UnresolvedLink>) {
        let fetched = join_all(links.iter().map(|link| resolver.fetch(link))).await;

        let mut reservations = NameReservations::new();
        let mut ctx = PlanContext::new(&self.settings.download_root, &mut reservations);
        if let Some(month_dir) = &self.month_dir {
            ctx = ctx.with_month_dir(month_dir.clone());
        }

        let mut job = BatchJob::new();
        let mut unresolved = Vec::new();
        for (link, record) in links.iter().zip(fetched) {
            match record.and_then(|data| resolver.plan(&data, &mut ctx)) {
                Ok(items) => {
                    debug!(link = %link, items = items.len(), "link resolved");
                    job.extend(items);
                }
                Err(error) => {
                    let skipped = UnresolvedLink {
                        link: link.clone(),
                        error,
                    };
                    warn!(
                        link = %skipped.link,
                        kind = %skipped.kind(),
                        error = %skipped.error,
                        "link not resolved; skipping"
                    );
                    unresolved.push(skipped);
                }
            }
        }
        (job, unresolved)
    }
}
