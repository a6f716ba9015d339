//! Shared User-Agent string for resolution and download traffic.

/// Default User-Agent for every request of a run.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("clipgrab/{version}")
}
