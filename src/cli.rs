//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Resumable single-file download manager with crash recovery.
///
/// Streams one URL at a time to disk, checkpoints progress so an interrupted
/// download can be resumed, and keeps a short history of recent URLs.
#[derive(Parser, Debug)]
#[command(name = "dlm")]
#[command(author, version, about)]
pub struct Args {
    /// URL of the file to download
    pub url: Option<String>,

    /// Destination directory (defaults to the configured download directory)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Directory holding the state/settings/history documents
    /// (defaults to the per-user config directory)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Answer yes to the resume prompt without asking
    #[arg(short = 'y', long)]
    pub assume_yes: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
