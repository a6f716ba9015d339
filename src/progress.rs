//! Terminal progress bar for batch runs.

use clipgrab_core::Progress;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

pub(crate) fn is_dumb_terminal() -> bool {
    std::env::var("TERM")
        .map(|value| value.eq_ignore_ascii_case("dumb"))
        .unwrap_or(false)
}

pub(crate) fn should_use_bar(stderr_is_terminal: bool, quiet: bool, dumb_terminal: bool) -> bool {
    stderr_is_terminal && !quiet && !dumb_terminal
}

/// Turns scheduler progress into log lines and, on a terminal, a bar.
pub(crate) struct ProgressReporter {
    bar: Option<ProgressBar>,
}

impl ProgressReporter {
    pub(crate) fn new(use_bar: bool) -> Self {
        let bar = use_bar.then(|| {
            let bar = ProgressBar::new(0);
            bar.set_style(
                ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar
        });
        Self { bar }
    }

    pub(crate) fn report(&self, progress: &Progress<'_>) {
        match &self.bar {
            Some(bar) => {
                bar.set_length(progress.total as u64);
                bar.set_position(progress.done as u64);
                bar.set_message(progress.outcome.label.clone());
                bar.suspend(|| info!("{progress}"));
            }
            None => info!("{progress}"),
        }
    }

    pub(crate) fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_only_on_interactive_terminal() {
        assert!(should_use_bar(true, false, false));
        assert!(!should_use_bar(false, false, false));
        assert!(!should_use_bar(true, true, false));
        assert!(!should_use_bar(true, false, true));
    }

    #[test]
    fn test_disabled_reporter_has_no_bar() {
        let reporter = ProgressReporter::new(false);
        assert!(reporter.bar.is_none());
        reporter.finish();
    }
}
