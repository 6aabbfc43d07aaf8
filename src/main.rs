//! CLI entry point for the bulk downloader.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use bulk_downloader::logging::{default_log_level, init_logging};
use bulk_downloader::{DownloadOrchestrator, HttpClient, read_url_list};
use clap::Parser;
use tracing::{debug, error, info};

mod cli;

use cli::Args;

/// Process outcome. Individual download failures never change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessExit {
    Success,
    ConfigError,
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        match exit {
            ProcessExit::Success => ExitCode::SUCCESS,
            ProcessExit::ConfigError => ExitCode::from(1),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            // --help / --version print to stdout and are not failures
            return if e.use_stderr() {
                ProcessExit::ConfigError.into()
            } else {
                ProcessExit::Success.into()
            };
        }
    };

    init_logging(default_log_level(args.verbose, args.quiet));
    info!("program started");
    debug!(?args, "CLI arguments parsed");

    match run(&args).await {
        Ok(()) => ProcessExit::Success.into(),
        Err(e) => {
            error!(error = format!("{e:#}"), "fatal error");
            ProcessExit::ConfigError.into()
        }
    }
}

async fn run(args: &Args) -> Result<()> {
    // An unreadable list is reported and the run proceeds with no URLs.
    let urls = match read_url_list(&args.url_list) {
        Ok(urls) => {
            info!(urls = urls.len(), list = %args.url_list.display(), "loaded URL list");
            urls
        }
        Err(e) => {
            error!(error = %e, "unable to read URL list");
            Vec::new()
        }
    };

    let client = HttpClient::with_connect_timeout(args.connect_timeout)?;
    let orchestrator = DownloadOrchestrator::new(args.max_threads as usize, Arc::new(client))?
        .with_schedule(args.schedule);

    let report = orchestrator.run(&urls, &args.output_dir).await?;

    info!(
        completed = report.stats.completed(),
        failed = report.stats.failed(),
        total = report.stats.total(),
        "program finished"
    );

    Ok(())
}
