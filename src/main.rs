//! CLI entry point for clipgrab.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use clipgrab_core::download::FFMPEG_BINARY;
use clipgrab_core::{
    BatchScheduler, FfmpegTranscoder, ResolveMode, Settings, Transcoder, read_links_file,
};
use tracing::{debug, info};

mod cli;
mod progress;

use cli::Args;
use progress::{ProgressReporter, is_dumb_terminal, should_use_bar};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .init();

    debug!(?args, "CLI arguments parsed");

    let settings = load_settings(&args)?;
    let links = collect_links(&args)?;
    if links.is_empty() {
        info!("No links to download");
        return Ok(());
    }

    let mode = if args.audio {
        ResolveMode::Audio
    } else {
        ResolveMode::Media
    };

    // Only audio mode ever transcodes; skip the PATH lookup otherwise.
    let transcoder: Arc<dyn Transcoder> = match mode {
        ResolveMode::Audio => Arc::new(FfmpegTranscoder::locate(settings.ffmpeg.as_deref())),
        ResolveMode::Media => Arc::new(FfmpegTranscoder::new(
            settings
                .ffmpeg
                .clone()
                .unwrap_or_else(|| PathBuf::from(FFMPEG_BINARY)),
        )),
    };

    info!(
        links = links.len(),
        %mode,
        root = %settings.download_root.display(),
        "clipgrab starting"
    );

    let scheduler = BatchScheduler::new(settings, mode, transcoder)?;
    let reporter = ProgressReporter::new(should_use_bar(
        io::stderr().is_terminal(),
        args.quiet,
        is_dumb_terminal(),
    ));

    let report = scheduler
        .run(&links, |progress| reporter.report(progress))
        .await?;
    reporter.finish();

    info!(
        links = report.links_submitted,
        unresolved = report.unresolved.len(),
        completed = report.completed(),
        failed = report.failed(),
        "Download complete"
    );

    Ok(())
}

/// Loads the settings file and applies command-line overrides.
fn load_settings(args: &Args) -> Result<Settings> {
    let mut settings = Settings::load(&args.config)
        .with_context(|| format!("failed to load settings from {}", args.config.display()))?;

    if let Some(concurrency) = args.concurrency {
        settings.concurrency = Some(usize::from(concurrency));
    }
    if let Some(retries) = args.retries {
        settings.retry_count = u32::from(retries);
    }
    if let Some(dir) = &args.output_dir {
        settings.download_root = std::path::absolute(dir)
            .with_context(|| format!("invalid output directory {}", dir.display()))?;
    }

    debug!(?settings, "settings loaded");
    Ok(settings)
}

/// Links from `--link`, the links file, or an interactive prompt for its path.
fn collect_links(args: &Args) -> Result<Vec<String>> {
    if !args.links.is_empty() {
        return Ok(args
            .links
            .iter()
            .map(|link| link.trim().to_string())
            .filter(|link| !link.is_empty())
            .collect());
    }

    let path = match &args.links_file {
        Some(path) => path.clone(),
        None => prompt_links_file()?,
    };

    let links = read_links_file(&path)
        .with_context(|| format!("failed to read links file {}", path.display()))?;
    info!(path = %path.display(), links = links.len(), "read links file");
    Ok(links)
}

fn prompt_links_file() -> Result<PathBuf> {
    let mut stdout = io::stdout();
    write!(stdout, "Links file path: ")?;
    stdout.flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read links file path")?;

    let path = line.trim().trim_matches('"');
    if path.is_empty() {
        bail!("no links file given");
    }
    Ok(PathBuf::from(path))
}
