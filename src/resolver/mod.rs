//! Link resolution: share link → resolution record → work items.
//!
//! # Architecture
//!
//! - [`ResolutionClient`] - one GET per link against the extraction API
//! - [`ResolveStrategy`] - turns a [`ResolutionData`] record into [`WorkItem`]s
//! - [`MediaStrategy`] - type-based branching (video / image gallery)
//! - [`AudioStrategy`] - audio-field preference list with transcode fallback
//! - [`Resolver`] - a client paired with the strategy of the active [`ResolveMode`]
//!
//! Planning runs sequentially after all fetches complete, so every target
//! name of the batch is reserved in one [`NameReservations`] before any
//! download starts.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use clipgrab_core::download::filename::NameReservations;
//! use clipgrab_core::resolver::{PlanContext, ResolveMode, ResolutionClient, Resolver};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ResolutionClient::new(reqwest::Client::new(), "https://api.example.com/query")?;
//! let resolver = Resolver::new(client, ResolveMode::Media);
//! let mut reservations = NameReservations::new();
//! let mut ctx = PlanContext::new(Path::new("/data/clips"), &mut reservations);
//! let items = resolver.resolve("https://v.example.com/s/AbC", &mut ctx).await?;
//! println!("{} item(s)", items.len());
//! # Ok(())
//! # }
//! ```

mod audio;
mod client;
mod error;
mod media;

pub use audio::{AUDIO_URL_FIELDS, AudioStrategy};
pub use client::{GALLERY_TYPE, ResolutionClient, ResolutionData, VIDEO_TYPE, parse_response};
pub use error::ResolveError;
pub use media::MediaStrategy;

use std::fmt;
use std::path::Path;

use tracing::{info, instrument};

use crate::download::filename::{NameReservations, sanitize_title};
use crate::job::WorkItem;

/// Title used when a record carries none.
pub const FALLBACK_TITLE: &str = "untitled";

/// `chrono` format of the per-month directory (`2025年04月`).
pub const MONTH_DIR_FORMAT: &str = "%Y年%m月";

/// Which resolution strategy a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveMode {
    /// Videos and image galleries, saved under the dated tree.
    #[default]
    Media,
    /// A single audio file per link, saved at the download root.
    Audio,
}

impl ResolveMode {
    /// Returns the strategy implementing this mode.
    #[must_use]
    pub fn strategy(self) -> Box<dyn ResolveStrategy> {
        match self {
            Self::Media => Box::new(MediaStrategy),
            Self::Audio => Box::new(AudioStrategy),
        }
    }
}

impl fmt::Display for ResolveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Media => write!(f, "media"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// Planning state shared by every link of one batch.
#[derive(Debug)]
pub struct PlanContext<'a> {
    /// Absolute download root.
    pub download_root: &'a Path,
    /// Per-month directory name under the root.
    pub month_dir: String,
    /// Names already handed out in this batch.
    pub reservations: &'a mut NameReservations,
}

impl<'a> PlanContext<'a> {
    /// Creates a context for the current local month.
    #[must_use]
    pub fn new(download_root: &'a Path, reservations: &'a mut NameReservations) -> Self {
        Self {
            download_root,
            month_dir: chrono::Local::now().format(MONTH_DIR_FORMAT).to_string(),
            reservations,
        }
    }

    /// Overrides the month directory.
    #[must_use]
    pub fn with_month_dir(mut self, month_dir: impl Into<String>) -> Self {
        self.month_dir = month_dir.into();
        self
    }

    /// Creates `dir` and its parents if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Filesystem`] if creation fails.
    pub fn ensure_dir(&self, dir: &Path) -> Result<(), ResolveError> {
        if dir.is_dir() {
            return Ok(());
        }
        std::fs::create_dir_all(dir).map_err(|e| ResolveError::filesystem(dir, e.to_string()))?;
        info!(path = %dir.display(), "created directory");
        Ok(())
    }
}

/// Turns a resolution record into work items.
///
/// Implementations create target directories and reserve every target name
/// through [`PlanContext::reservations`] so paths are unique per batch.
pub trait ResolveStrategy: Send + Sync + fmt::Debug {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Plans the work items for one record.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolveError`] when the record is unusable or a target
    /// cannot be prepared.
    fn plan(
        &self,
        data: &ResolutionData,
        ctx: &mut PlanContext<'_>,
    ) -> Result<Vec<WorkItem>, ResolveError>;
}

/// Sanitized title of a record.
///
/// Whitespace is replaced, not trimmed. A missing or blank title, or one
/// that sanitizes to nothing but dots, becomes [`FALLBACK_TITLE`] so it can
/// never name `.` or `..` as a directory.
#[must_use]
pub fn record_title(data: &ResolutionData) -> String {
    let raw = data.title.as_deref().unwrap_or_default();
    if raw.trim().is_empty() {
        return FALLBACK_TITLE.to_string();
    }
    let title = sanitize_title(raw);
    if title.chars().all(|c| c == '.') {
        FALLBACK_TITLE.to_string()
    } else {
        title
    }
}

/// A resolution client paired with a strategy.
#[derive(Debug)]
pub struct Resolver {
    client: ResolutionClient,
    strategy: Box<dyn ResolveStrategy>,
}

impl Resolver {
    /// Creates a resolver for `mode`.
    #[must_use]
    pub fn new(client: ResolutionClient, mode: ResolveMode) -> Self {
        Self::with_strategy(client, mode.strategy())
    }

    /// Creates a resolver with a custom strategy.
    #[must_use]
    pub fn with_strategy(client: ResolutionClient, strategy: Box<dyn ResolveStrategy>) -> Self {
        Self { client, strategy }
    }

    /// The active strategy.
    #[must_use]
    pub fn strategy(&self) -> &dyn ResolveStrategy {
        self.strategy.as_ref()
    }

    /// Fetches the resolution record for `link`.
    ///
    /// # Errors
    ///
    /// See [`ResolutionClient::fetch`].
    pub async fn fetch(&self, link: &str) -> Result<ResolutionData, ResolveError> {
        self.client.fetch(link).await
    }

    /// Plans work items for an already fetched record.
    ///
    /// # Errors
    ///
    /// See [`ResolveStrategy::plan`].
    pub fn plan(
        &self,
        data: &ResolutionData,
        ctx: &mut PlanContext<'_>,
    ) -> Result<Vec<WorkItem>, ResolveError> {
        self.strategy.plan(data, ctx)
    }

    /// Fetches and plans one link.
    ///
    /// # Errors
    ///
    /// Any error from [`Resolver::fetch`] or [`Resolver::plan`].
    #[instrument(skip(self, ctx), fields(strategy = self.strategy.name()))]
    pub async fn resolve(
        &self,
        link: &str,
        ctx: &mut PlanContext<'_>,
    ) -> Result<Vec<WorkItem>, ResolveError> {
        let data = self.fetch(link).await?;
        self.plan(&data, ctx)
    }
}
