//! Download orchestrator: runs every job under a fixed concurrency bound.
//!
//! # Overview
//!
//! The concurrency limit is `min(requested, available parallelism)`. With the
//! default [`Schedule::Waves`], jobs are cut into consecutive groups of that
//! size; each group is spawned at once and fully joined before the next group
//! starts, so a slot freed early stays idle until its wave completes.
//! [`Schedule::Pool`] instead keeps every slot busy with a semaphore.
//!
//! Before any job starts the output directory is created and its existing
//! entries seed the [`FilenameRegistry`], so downloads never overwrite files
//! that were already there.
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
//! let client = Arc::new(HttpClient::new()?);
//! let orchestrator = DownloadOrchestrator::new(4, client)?;
//! let urls = vec!["https://example.com/file.zip".to_string()];
//! let report = orchestrator.run(&urls, Path::new("./downloads")).await?;
//! println!("Completed: {}, Failed: {}", report.stats.completed(), report.stats.failed());
//! # Ok(())
//! # }
//! ```

mod task;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

pub use task::{DownloadJob, DownloadOutcome, DownloadResult, DownloadTask, TaskState};

use super::client::HttpFetcher;
use super::constants::FALLBACK_PARALLELISM;
use super::registry::FilenameRegistry;

/// Errors that abort a whole run. Per-download failures never show up here.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A concurrency limit of zero was requested.
    #[error("invalid concurrency value {value}: must be at least 1")]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// The root output directory could not be created.
    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        /// The output directory.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The output directory exists but its entries could not be listed.
    #[error("cannot scan output directory {path}: {source}")]
    ScanOutputDir {
        /// The output directory.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// How jobs are scheduled onto the concurrency slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Schedule {
    /// Fixed-size waves joined with a barrier before the next wave starts.
    #[default]
    Waves,
    /// Bounded pool: the next job starts as soon as any slot frees up.
    Pool,
}

/// Counters from a run.
///
/// Atomic so concurrent tasks' results can be recorded without a lock.
#[derive(Debug, Default)]
pub struct DownloadStats {
    completed: AtomicUsize,
    failed: AtomicUsize,
    waves: AtomicUsize,
}

impl DownloadStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of successfully completed downloads.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Returns the number of failed downloads.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Returns the total number of jobs processed (completed + failed).
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed() + self.failed()
    }

    /// Returns the number of waves launched (zero under [`Schedule::Pool`]).
    #[must_use]
    pub fn waves(&self) -> usize {
        self.waves.load(Ordering::SeqCst)
    }

    fn increment_completed(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_waves(&self) {
        self.waves.fetch_add(1, Ordering::SeqCst);
    }
}

/// Everything a run produced.
#[derive(Debug)]
pub struct RunReport {
    /// One result per job, in input order. A task that panicked has no entry.
    pub results: Vec<DownloadResult>,
    /// Aggregate counters.
    pub stats: DownloadStats,
}

/// Returns `min(requested, available)`, with [`FALLBACK_PARALLELISM`] standing
/// in for an unknown `available`.
#[must_use]
pub fn effective_limit(requested: usize, available: Option<usize>) -> usize {
    requested.min(available.unwrap_or(FALLBACK_PARALLELISM))
}

/// Hardware parallelism reported by the platform, if it can tell.
#[must_use]
pub fn available_parallelism() -> Option<usize> {
    std::thread::available_parallelism().ok().map(usize::from)
}

/// Runs a list of URLs to completion under a concurrency bound.
pub struct DownloadOrchestrator {
    fetcher: Arc<dyn HttpFetcher>,
    limit: usize,
    schedule: Schedule,
}

impl std::fmt::Debug for DownloadOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadOrchestrator")
            .field("limit", &self.limit)
            .field("schedule", &self.schedule)
            .finish_non_exhaustive()
    }
}

impl DownloadOrchestrator {
    /// Creates an orchestrator capped at the machine's available parallelism.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if `requested` is zero.
    pub fn new(requested: usize, fetcher: Arc<dyn HttpFetcher>) -> Result<Self, EngineError> {
        Self::with_parallelism(requested, available_parallelism(), fetcher)
    }

    /// Creates an orchestrator against an explicit parallelism figure.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if `requested` is zero.
    #[instrument(level = "debug", skip(fetcher))]
    pub fn with_parallelism(
        requested: usize,
        available: Option<usize>,
        fetcher: Arc<dyn HttpFetcher>,
    ) -> Result<Self, EngineError> {
        if requested == 0 {
            return Err(EngineError::InvalidConcurrency { value: requested });
        }
        let limit = effective_limit(requested, available).max(1);
        debug!(requested, ?available, limit, "creating download orchestrator");
        Ok(Self {
            fetcher,
            limit,
            schedule: Schedule::default(),
        })
    }

    /// Selects the scheduling strategy.
    #[must_use]
    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Effective concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.limit
    }

    /// Configured schedule.
    #[must_use]
    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    /// Downloads every URL into `output_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::OutputDir`] or [`EngineError::ScanOutputDir`] if the
    /// output directory is unusable. Individual download failures do NOT cause
    /// this method to error; they are logged and reported in the [`RunReport`].
    #[instrument(skip(self, urls), fields(jobs = urls.len(), output_dir = %output_dir.display()))]
    pub async fn run(&self, urls: &[String], output_dir: &Path) -> Result<RunReport, EngineError> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|source| EngineError::OutputDir {
                path: output_dir.to_path_buf(),
                source,
            })?;
        let registry = FilenameRegistry::scan(output_dir)
            .await
            .map_err(|source| EngineError::ScanOutputDir {
                path: output_dir.to_path_buf(),
                source,
            })?;
        let registry = Arc::new(registry);

        let jobs: Vec<DownloadJob> = urls
            .iter()
            .map(|url| DownloadJob::new(url.as_str(), output_dir))
            .collect();

        info!(
            jobs = jobs.len(),
            concurrency = self.limit,
            schedule = ?self.schedule,
            "starting downloads"
        );

        let stats = DownloadStats::new();
        let results = match self.schedule {
            Schedule::Waves => self.run_waves(jobs, &registry, &stats).await,
            Schedule::Pool => self.run_pool(jobs, &registry, &stats).await,
        };

        info!(
            completed = stats.completed(),
            failed = stats.failed(),
            total = stats.total(),
            "all downloads finished"
        );

        Ok(RunReport { results, stats })
    }

    async fn run_waves(
        &self,
        jobs: Vec<DownloadJob>,
        registry: &Arc<FilenameRegistry>,
        stats: &DownloadStats,
    ) -> Vec<DownloadResult> {
        let mut results = Vec::with_capacity(jobs.len());
        let mut jobs = jobs.into_iter().peekable();
        let mut wave_number = 0usize;

        while jobs.peek().is_some() {
            wave_number += 1;
            stats.increment_waves();

            let handles: Vec<JoinHandle<DownloadResult>> = jobs
                .by_ref()
                .take(self.limit)
                .map(|job| self.spawn_task(job, registry, None))
                .collect();
            debug!(wave = wave_number, size = handles.len(), "wave started");

            // Barrier: every task of this wave must finish before the next wave spawns.
            join_all(handles, stats, &mut results).await;
            debug!(wave = wave_number, "wave joined");
        }

        results
    }

    async fn run_pool(
        &self,
        jobs: Vec<DownloadJob>,
        registry: &Arc<FilenameRegistry>,
        stats: &DownloadStats,
    ) -> Vec<DownloadResult> {
        let semaphore = Arc::new(Semaphore::new(self.limit));
        let mut handles = Vec::with_capacity(jobs.len());

        for job in jobs {
            // The semaphore lives on this stack frame and is never closed.
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            handles.push(self.spawn_task(job, registry, Some(permit)));
        }

        let mut results = Vec::with_capacity(handles.len());
        join_all(handles, stats, &mut results).await;
        results
    }

    fn spawn_task(
        &self,
        job: DownloadJob,
        registry: &Arc<FilenameRegistry>,
        permit: Option<tokio::sync::OwnedSemaphorePermit>,
    ) -> JoinHandle<DownloadResult> {
        let registry = Arc::clone(registry);
        let fetcher = Arc::clone(&self.fetcher);
        tokio::spawn(async move {
            // Permit is dropped when this block exits (RAII)
            let _permit = permit;
            DownloadTask::new(job, &registry, fetcher.as_ref()).run().await
        })
    }
}

async fn join_all(
    handles: Vec<JoinHandle<DownloadResult>>,
    stats: &DownloadStats,
    results: &mut Vec<DownloadResult>,
) {
    for handle in handles {
        match handle.await {
            Ok(result) => {
                if result.is_success() {
                    stats.increment_completed();
                } else {
                    stats.increment_failed();
                    warn!(url = %result.url, "skipping URL due to failure");
                }
                results.push(result);
            }
            Err(e) => {
                // A panicked task loses its result but never fails the run.
                warn!(error = %e, "download task panicked");
                stats.increment_failed();
            }
        }
    }
}
