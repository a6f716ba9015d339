//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use clipgrab_core::DEFAULT_CONFIG_PATH;

/// Batch download videos, image galleries, or audio from share links.
///
/// Each link is resolved through the extraction API configured in the
/// settings file, then saved under the download root.
#[derive(Parser, Debug)]
#[command(name = "clipgrab")]
#[command(author, version, about)]
pub struct Args {
    /// File with one share link per line (prompted for when omitted)
    #[arg(value_name = "LINKS_FILE")]
    pub links_file: Option<PathBuf>,

    /// Share link to download; repeat for several (skips the links file)
    #[arg(long = "link", value_name = "LINK")]
    pub links: Vec<String>,

    /// Save audio tracks as MP3 instead of videos and images
    #[arg(long)]
    pub audio: bool,

    /// Settings file
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Maximum concurrent downloads (1-100), overrides the settings file
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// Attempts per item (1-20), overrides the settings file
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u8).range(1..=20))]
    pub retries: Option<u8>,

    /// Download root, overrides the settings file
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
