//! URL list input.
//!
//! The list file holds one URL per line. Empty lines are skipped; every other
//! line is taken verbatim (no trimming, no comment syntax).

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Configuration problems that stop a run before any download starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The URL list file could not be read.
    #[error("cannot read URL list {path}: {source}")]
    UrlList {
        /// Path given on the command line.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Splits list text into URLs, dropping empty lines.
#[must_use]
pub fn parse_url_list(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reads and parses a URL list file.
///
/// # Errors
///
/// Returns [`ConfigError::UrlList`] if the file cannot be read as UTF-8 text.
pub fn read_url_list(path: &Path) -> Result<Vec<String>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::UrlList {
        path: path.to_path_buf(),
        source,
    })?;
    let urls = parse_url_list(&text);
    debug!(path = %path.display(), urls = urls.len(), "read URL list");
    Ok(urls)
}
