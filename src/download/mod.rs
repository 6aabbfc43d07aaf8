//! Bulk HTTP downloading into a single output directory.
//!
//! # Features
//!
//! - Bounded concurrency: `min(requested, available parallelism)` tasks at once
//! - Wave scheduling with a barrier between waves (or an optional bounded pool)
//! - Filenames from the URL, overridden by `Content-Disposition` when present
//! - Collision-free names (`name`, `name(1)`, `name(2)`, ...) via a shared registry
//! - Partial files removed and names released when a download fails
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use bulk_downloader::download::{DownloadOrchestrator, HttpClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = DownloadOrchestrator::new(8, Arc::new(HttpClient::new()?))?;
//! let urls = vec!["https://example.com/paper.pdf".to_string()];
//! let report = orchestrator.run(&urls, Path::new("./downloads")).await?;
//! for result in &report.results {
//!     println!("{}: {:?}", result.url, result.path());
//! }
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod engine;
mod error;
pub mod filename;
mod registry;

pub use client::{BodyStream, FetchResponse, HttpClient, HttpFetcher};
pub use engine::{
    DownloadJob, DownloadOrchestrator, DownloadOutcome, DownloadResult, DownloadStats,
    DownloadTask, EngineError, RunReport, Schedule, TaskState, available_parallelism,
    effective_limit,
};
pub use error::{DownloadError, FailureKind, TransportError};
pub use registry::FilenameRegistry;

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
