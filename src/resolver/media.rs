//! Video / image-gallery planning.
//!
//! ```text
//! {root}/{YYYY年MM月}/videos/{title}/{title}_{NNNNN}.mp4
//! {root}/{YYYY年MM月}/images/{title}/{title}_{NNNNN}.png
//! ```

use tracing::debug;

use super::{
    GALLERY_TYPE, PlanContext, ResolutionData, ResolveError, ResolveStrategy, VIDEO_TYPE,
    record_title,
};
use crate::download::filename::sequenced_file_name;
use crate::job::WorkItem;

const VIDEO_DIR: &str = "videos";
const IMAGE_DIR: &str = "images";
const VIDEO_EXT: &str = ".mp4";
const IMAGE_EXT: &str = ".png";

/// Plans by record `type`: one item for a video, one per image for a gallery.
#[derive(Debug, Clone, Copy, Default)]
pub struct MediaStrategy;

impl ResolveStrategy for MediaStrategy {
    fn name(&self) -> &'static str {
        "media"
    }

    fn plan(
        &self,
        data: &ResolutionData,
        ctx: &mut PlanContext<'_>,
    ) -> Result<Vec<WorkItem>, ResolveError> {
        let title = record_title(data);
        match data.kind() {
            Some(VIDEO_TYPE) => plan_video(data, &title, ctx),
            Some(GALLERY_TYPE) => plan_gallery(data, &title, ctx),
            _ => Err(ResolveError::UnsupportedType {
                kind: data.raw_kind(),
            }),
        }
    }
}

fn plan_video(
    data: &ResolutionData,
    title: &str,
    ctx: &mut PlanContext<'_>,
) -> Result<Vec<WorkItem>, ResolveError> {
    let url = data.download_url().ok_or(ResolveError::NoDownloadUrl)?;

    let dir = ctx
        .download_root
        .join(&ctx.month_dir)
        .join(VIDEO_DIR)
        .join(title);
    ctx.ensure_dir(&dir)?;

    let name = ctx
        .reservations
        .reserve(&dir, &sequenced_file_name(title, 1, VIDEO_EXT), 1)?;
    debug!(file = %name.file, "planned video");

    let target = dir.join(&name.file);
    Ok(vec![WorkItem::direct(name.file, target, url)])
}

fn plan_gallery(
    data: &ResolutionData,
    title: &str,
    ctx: &mut PlanContext<'_>,
) -> Result<Vec<WorkItem>, ResolveError> {
    let pics = data.image_urls();
    if pics.is_empty() {
        return Err(ResolveError::NoDownloadUrl);
    }

    let dir = ctx
        .download_root
        .join(&ctx.month_dir)
        .join(IMAGE_DIR)
        .join(title);
    ctx.ensure_dir(&dir)?;

    let mut items = Vec::with_capacity(pics.len());
    let mut next = 1;
    for url in pics {
        let name = ctx
            .reservations
            .reserve(&dir, &sequenced_file_name(title, next, IMAGE_EXT), next)?;
        next = name.fno.saturating_add(1);
        let target = dir.join(&name.file);
        items.push(WorkItem::direct(name.file, target, url));
    }
    debug!(count = items.len(), "planned gallery");
    Ok(items)
}
