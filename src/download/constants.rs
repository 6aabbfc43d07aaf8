//! Constants for the download module (timeouts, naming and scheduling fallbacks).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Idle read timeout between body chunks (5 minutes, generous for slow servers).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Filename used when a URL has no usable last path segment.
pub const FALLBACK_FILENAME: &str = "downloaded_file";

/// Parallelism assumed when the platform cannot report it.
pub const FALLBACK_PARALLELISM: usize = 2;
