//! Error types for the download module.
//!
//! Every per-download failure is one of these variants. They are caught at the
//! task boundary and turned into a failed [`DownloadResult`](super::DownloadResult),
//! so none of them ever aborts a run.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed transport error, so fetchers other than reqwest can report failures too.
pub type TransportError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while downloading a single URL.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Parent directories for the output path could not be created.
    #[error("cannot create directories for {path}: {source}")]
    Filesystem {
        /// The output path whose parent could not be created.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Network-level error (DNS resolution, connection refused, TLS, reset mid-body, ...).
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying transport error.
        #[source]
        source: TransportError,
    },

    /// The URL could not be turned into a request at all.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The server answered with something other than 200.
    #[error(
        "server responded with code {status}{} for {url}",
        .reason.as_deref().map_or(String::new(), |r| format!(" ({r})"))
    )]
    HttpStatus {
        /// The URL that returned the status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// Canonical reason phrase, when known.
        reason: Option<String>,
    },

    /// Creating, writing or flushing the output file failed.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Coarse failure classes, one per terminal failure state of a download task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Transport failure: the request never produced a usable response.
    Network,
    /// Non-200 response.
    HttpStatus,
    /// Local filesystem failure.
    Io,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Network => "network",
            Self::HttpStatus => "http-status",
            Self::Io => "io",
        };
        f.write_str(label)
    }
}

impl DownloadError {
    /// Creates a filesystem error for a path whose directories could not be made.
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Creates a network error from any transport error.
    pub fn network(url: impl Into<String>, source: impl Into<TransportError>) -> Self {
        Self::Network {
            url: url.into(),
            source: source.into(),
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16, reason: Option<String>) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            reason,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns the failure class of this error.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Network { .. } | Self::InvalidUrl { .. } => FailureKind::Network,
            Self::HttpStatus { .. } => FailureKind::HttpStatus,
            Self::Filesystem { .. } | Self::Io { .. } => FailureKind::Io,
        }
    }
}

// No From<reqwest::Error> / From<std::io::Error>: every variant needs the url or
// path context the source errors don't carry.
