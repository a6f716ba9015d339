//! Work items and batch jobs produced by resolution.
//!
//! A [`WorkItem`] is one independently downloadable unit: a resolved source
//! URL paired with a target path that was reserved before any download
//! started. A [`BatchJob`] is the ordered list of items built from all links
//! submitted in one run.

use std::path::{Path, PathBuf};

use url::Url;

use crate::download::filename::truncate_label;

/// Maximum length (in characters) of [`WorkItem::truncated_label`].
pub const LABEL_MAX_CHARS: usize = 30;

/// Extensions that can be saved as-is without transcoding.
pub const DIRECT_AUDIO_EXTENSIONS: [&str; 2] = [".mp3", ".m4a"];

/// One concrete download unit with a reserved target path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Sanitized human-readable name (usually the target file name).
    pub display_title: String,
    /// `display_title` shortened for log output; never longer than [`LABEL_MAX_CHARS`].
    pub truncated_label: String,
    /// Absolute, batch-unique destination path.
    pub target_path: PathBuf,
    /// Remote resource location.
    pub source_url: String,
    /// Whether the worker must go through the transcoder instead of a plain download.
    pub requires_transcode: bool,
}

impl WorkItem {
    /// Creates a work item that is downloaded directly.
    #[must_use]
    pub fn direct(
        display_title: impl Into<String>,
        target_path: impl Into<PathBuf>,
        source_url: impl Into<String>,
    ) -> Self {
        Self::new(display_title, target_path, source_url, false)
    }

    /// Creates a work item, deriving the truncated label from the title.
    #[must_use]
    pub fn new(
        display_title: impl Into<String>,
        target_path: impl Into<PathBuf>,
        source_url: impl Into<String>,
        requires_transcode: bool,
    ) -> Self {
        let display_title = display_title.into();
        let truncated_label = truncate_label(&display_title, LABEL_MAX_CHARS);
        Self {
            display_title,
            truncated_label,
            target_path: target_path.into(),
            source_url: source_url.into(),
            requires_transcode,
        }
    }

    /// Returns the directory the target file lives in.
    #[must_use]
    pub fn target_dir(&self) -> Option<&Path> {
        self.target_path.parent()
    }
}

/// Returns true when `url` does not point at a directly saveable audio file.
///
/// The extension is taken from the URL path when the URL parses, so query
/// strings (`.../a.mp3?sig=...`) do not defeat the check. Comparison is
/// case-insensitive.
#[must_use]
pub fn needs_transcode(url: &str) -> bool {
    let path = Url::parse(url).map_or_else(|_| url.to_string(), |parsed| parsed.path().to_string());
    let path = path.to_ascii_lowercase();
    !DIRECT_AUDIO_EXTENSIONS
        .iter()
        .any(|ext| path.ends_with(ext))
}

/// Ordered work items derived from the links of one run.
///
/// Submission order follows the order links were given; completion order is
/// up to the scheduler.
#[derive(Debug, Clone, Default)]
pub struct BatchJob {
    items: Vec<WorkItem>,
}

impl BatchJob {
    /// Creates an empty job.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the items resolved from one link, keeping their order.
    pub fn extend(&mut self, items: impl IntoIterator<Item = WorkItem>) {
        self.items.extend(items);
    }

    /// Number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when no items were queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates items in submission order.
    pub fn iter(&self) -> impl Iterator<Item = &WorkItem> {
        self.items.iter()
    }

    /// Consumes the job, yielding items in submission order.
    #[must_use]
    pub fn into_items(self) -> Vec<WorkItem> {
        self.items
    }
}
