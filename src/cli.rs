//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use bulk_downloader::Schedule;
use bulk_downloader::download::constants::CONNECT_TIMEOUT_SECS;
use clap::Parser;

/// Bulk download a list of URLs with bounded concurrency.
///
/// Each URL in the list file is saved into the output directory under a
/// unique name taken from the server's Content-Disposition header or the URL.
#[derive(Parser, Debug)]
#[command(name = "bulk-downloader")]
#[command(author, version, about)]
pub struct Args {
    /// File with one URL per line (blank lines are skipped)
    pub url_list: PathBuf,

    /// Directory to save downloads into (created if missing)
    pub output_dir: PathBuf,

    /// Maximum simultaneous downloads (capped at available CPU parallelism)
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    pub max_threads: u32,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// How downloads are scheduled onto the concurrency slots
    #[arg(long, value_enum, default_value_t = Schedule::Waves)]
    pub schedule: Schedule,

    /// Seconds to wait for a connection before giving up on a URL (1-600)
    #[arg(long, default_value_t = CONNECT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=600))]
    pub connect_timeout: u64,
}
