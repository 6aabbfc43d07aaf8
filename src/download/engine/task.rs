//! Per-URL download task.
//!
//! A task walks `Init → Connecting → ResponseReceived → NameFinalized →
//! Writing → Done`, or drops into one of the `*Failed` states. Whatever goes
//! wrong is caught here and returned as a failed [`DownloadResult`]; the
//! orchestrator never sees an error from a single download.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, error, info, instrument, warn};

use crate::download::client::{BodyStream, HttpFetcher};
use crate::download::error::{DownloadError, FailureKind};
use crate::download::filename::{derive_from_header, derive_from_url};
use crate::download::registry::FilenameRegistry;

/// One URL to fetch into one output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    /// The URL exactly as it appeared in the input list.
    pub url: String,
    /// Directory the file is written into.
    pub output_dir: PathBuf,
}

impl DownloadJob {
    /// Creates a job.
    pub fn new(url: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            output_dir: output_dir.into(),
        }
    }
}

/// Lifecycle states of a download task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Provisional name claimed, directories being prepared.
    Init,
    /// GET in flight.
    Connecting,
    /// Status line and headers available.
    ResponseReceived,
    /// Final filename decided and claimed.
    NameFinalized,
    /// Body streaming to disk.
    Writing,
    /// File complete.
    Done,
    /// Transport failure.
    NetworkFailed,
    /// Non-200 response.
    HttpFailed,
    /// Filesystem failure.
    IoFailed,
}

impl TaskState {
    /// Terminal failure state for a failure class.
    #[must_use]
    pub fn failed(kind: FailureKind) -> Self {
        match kind {
            FailureKind::Network => Self::NetworkFailed,
            FailureKind::HttpStatus => Self::HttpFailed,
            FailureKind::Io => Self::IoFailed,
        }
    }

    /// Returns true for `Done` and every failure state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Done | Self::NetworkFailed | Self::HttpFailed | Self::IoFailed
        )
    }
}

/// How a download ended.
#[derive(Debug)]
pub enum DownloadOutcome {
    /// The file was written to this path.
    Success(PathBuf),
    /// The download failed; any partial file has been cleaned up.
    Failure(DownloadError),
}

/// Outcome of one [`DownloadJob`].
#[derive(Debug)]
pub struct DownloadResult {
    /// The job's URL.
    pub url: String,
    /// Success path or failure reason.
    pub outcome: DownloadOutcome,
}

impl DownloadResult {
    /// Returns true if the file was downloaded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, DownloadOutcome::Success(_))
    }

    /// Final path of a successful download.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.outcome {
            DownloadOutcome::Success(path) => Some(path),
            DownloadOutcome::Failure(_) => None,
        }
    }

    /// Failure reason of a failed download.
    #[must_use]
    pub fn error(&self) -> Option<&DownloadError> {
        match &self.outcome {
            DownloadOutcome::Success(_) => None,
            DownloadOutcome::Failure(e) => Some(e),
        }
    }

    /// The terminal state the task ended in.
    #[must_use]
    pub fn final_state(&self) -> TaskState {
        match &self.outcome {
            DownloadOutcome::Success(_) => TaskState::Done,
            DownloadOutcome::Failure(e) => TaskState::failed(e.kind()),
        }
    }
}

/// A single download in progress.
///
/// Tracks the name it currently holds in the registry and the file it has
/// created, so a failure at any point can undo exactly what was done.
pub struct DownloadTask<'a> {
    job: DownloadJob,
    registry: &'a FilenameRegistry,
    fetcher: &'a dyn HttpFetcher,
    state: TaskState,
    claimed: Option<String>,
    created: Option<PathBuf>,
}

impl<'a> DownloadTask<'a> {
    /// Creates a task in the `Init` state.
    pub fn new(job: DownloadJob, registry: &'a FilenameRegistry, fetcher: &'a dyn HttpFetcher) -> Self {
        Self {
            job,
            registry,
            fetcher,
            state: TaskState::Init,
            claimed: None,
            created: None,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Runs the task to a terminal state.
    #[instrument(skip(self), fields(url = %self.job.url))]
    pub async fn run(mut self) -> DownloadResult {
        info!(url = %self.job.url, "start downloading");

        let outcome = match self.execute().await {
            Ok((path, bytes)) => {
                self.transition(TaskState::Done);
                info!(path = %path.display(), bytes, "successfully downloaded");
                DownloadOutcome::Success(path)
            }
            Err(e) => {
                self.transition(TaskState::failed(e.kind()));
                match &e {
                    DownloadError::HttpStatus { status, reason, .. } => warn!(
                        url = %self.job.url,
                        status,
                        reason = reason.as_deref().unwrap_or("unknown"),
                        "server responded with non-200 status"
                    ),
                    other => error!(url = %self.job.url, kind = %other.kind(), error = %other, "download failed"),
                }
                self.cleanup().await;
                DownloadOutcome::Failure(e)
            }
        };

        DownloadResult {
            url: self.job.url,
            outcome,
        }
    }

    async fn execute(&mut self) -> Result<(PathBuf, u64), DownloadError> {
        let provisional = self.registry.claim(&derive_from_url(&self.job.url));
        self.claimed = Some(provisional.clone());
        let provisional_path = self.job.output_dir.join(&provisional);
        debug!(name = %provisional, "claimed provisional filename");

        if let Some(parent) = provisional_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::filesystem(&provisional_path, e))?;
        }

        self.transition(TaskState::Connecting);
        let response = self.fetcher.fetch(&self.job.url).await?;

        self.transition(TaskState::ResponseReceived);
        if response.status != 200 {
            return Err(DownloadError::http_status(
                &self.job.url,
                response.status,
                response.reason,
            ));
        }

        // The provisional claim has no file behind it yet, so switching to the
        // header name is a pure registry swap.
        let final_name = match response
            .content_disposition
            .as_deref()
            .and_then(derive_from_header)
        {
            Some(header_name) => {
                let renamed = self.registry.rename(&provisional, &header_name);
                debug!(from = %provisional, to = %renamed, "using Content-Disposition filename");
                self.claimed = Some(renamed.clone());
                renamed
            }
            None => provisional,
        };
        self.transition(TaskState::NameFinalized);

        let path = self.job.output_dir.join(&final_name);
        self.transition(TaskState::Writing);
        let file = File::create(&path)
            .await
            .map_err(|e| DownloadError::io(&path, e))?;
        self.created = Some(path.clone());

        let bytes = stream_to_file(file, response.body, &path).await?;
        Ok((path, bytes))
    }

    /// Deletes the file this task created, then frees its claim.
    ///
    /// The claim is kept if the file could not be deleted, so no later task is
    /// handed a name that still exists on disk.
    async fn cleanup(&mut self) {
        if let Some(path) = self.created.take() {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => info!(path = %path.display(), "incomplete file removed"),
                Err(e) => {
                    error!(path = %path.display(), error = %e, "failed to remove incomplete file");
                    return;
                }
            }
        }
        if let Some(name) = self.claimed.take() {
            self.registry.release(&name);
            debug!(name = %name, "released filename claim");
        }
    }

    fn transition(&mut self, next: TaskState) {
        debug!(from = ?self.state, to = ?next, "task state change");
        self.state = next;
    }
}

/// Streams the body into `file`, returning bytes written.
async fn stream_to_file(file: File, mut body: BodyStream, path: &Path) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut bytes_written: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer.flush().await.map_err(|e| DownloadError::io(path, e))?;
    writer
        .into_inner()
        .sync_all()
        .await
        .map_err(|e| DownloadError::io(path, e))?;

    Ok(bytes_written)
}
