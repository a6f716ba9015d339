//! Single-audio planning: one `{root}/{title}.mp3` per link.

use tracing::debug;

use super::{PlanContext, ResolutionData, ResolveError, ResolveStrategy, record_title};
use crate::download::filename::sequenced_file_name;
use crate::job::{WorkItem, needs_transcode};

/// Audio URL fields in order of preference (smallest bitrate first).
/// `downurl` is the video fallback and goes through the transcoder.
pub const AUDIO_URL_FIELDS: [&str; 9] = [
    "audio_32k_url",
    "audio_64k_url",
    "audio_128k_url",
    "mp3play_url",
    "m4a_url",
    "audio_url",
    "music",
    "music_url",
    "downurl",
];

const AUDIO_EXT: &str = ".mp3";

/// Picks the first non-empty audio field and targets the download root.
///
/// An existing file of the same name on disk is overwritten. Two links of
/// one batch that share a title get sequenced names instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct AudioStrategy;

impl AudioStrategy {
    /// Returns the preferred audio URL and the field it came from.
    #[must_use]
    pub fn pick_url(data: &ResolutionData) -> Option<(&'static str, &str)> {
        AUDIO_URL_FIELDS
            .iter()
            .find_map(|&field| data.string_field(field).map(|url| (field, url)))
    }
}

impl ResolveStrategy for AudioStrategy {
    fn name(&self) -> &'static str {
        "audio"
    }

    fn plan(
        &self,
        data: &ResolutionData,
        ctx: &mut PlanContext<'_>,
    ) -> Result<Vec<WorkItem>, ResolveError> {
        let (field, url) = Self::pick_url(data).ok_or(ResolveError::NoDownloadUrl)?;
        let title = record_title(data);

        let dir = ctx.download_root;
        ctx.ensure_dir(dir)?;

        let plain = format!("{title}{AUDIO_EXT}");
        let file = if ctx.reservations.reserve_exact(dir, &plain) {
            plain
        } else {
            ctx.reservations
                .reserve(dir, &sequenced_file_name(&title, 1, AUDIO_EXT), 1)?
                .file
        };

        let requires_transcode = needs_transcode(url);
        debug!(field, file = %file, requires_transcode, "planned audio");

        let target = dir.join(&file);
        Ok(vec![WorkItem::new(file, target, url, requires_transcode)])
    }
}
