//! Bulk Downloader Library
//!
//! Downloads a list of URLs into one directory with a bounded number of
//! concurrent transfers, guaranteeing that no two downloads end up with the
//! same filename and that failed downloads leave nothing behind.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`download`] - Filename resolution, claim registry, per-URL tasks and the orchestrator
//! - [`input`] - URL list reading
//! - [`logging`] - Timestamped stdout log lines

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod input;
pub mod logging;
mod user_agent;

// Re-export commonly used types
pub use download::{
    DownloadError, DownloadJob, DownloadOrchestrator, DownloadOutcome, DownloadResult,
    DownloadStats, EngineError, FailureKind, FilenameRegistry, HttpClient, HttpFetcher,
    RunReport, Schedule,
};
pub use input::{ConfigError, parse_url_list, read_url_list};
