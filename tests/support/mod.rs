//! Shared helpers for integration tests.
//!
//! - [`start_mock_server_or_skip`] guards wiremock tests in sandboxes that cannot bind sockets.
//! - [`ScriptedFetcher`] is an in-process [`HttpFetcher`] with per-URL canned replies,
//!   artificial latency and timing records, used where a real server cannot
//!   produce the behavior (mid-body resets) or where timing must be observed.
//! - [`EventLog`] is a tracing layer that keeps every event in emission order.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fmt;
use std::net::TcpListener;
use std::panic::Location;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bulk_downloader::DownloadError;
use bulk_downloader::download::{FetchResponse, HttpFetcher};
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use wiremock::MockServer;

#[must_use]
pub fn socket_tests_required() -> bool {
    std::env::var("BULK_DOWNLOADER_REQUIRE_SOCKET_TESTS")
        .ok()
        .is_some_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

#[track_caller]
#[must_use]
pub fn should_skip_socket_bound_test() -> bool {
    if TcpListener::bind("127.0.0.1:0").is_ok() {
        return false;
    }

    let location = Location::caller();
    let message = format!(
        "[socket-bound-test] cannot bind localhost socket at {}:{}; wiremock-based test cannot run in this environment",
        location.file(),
        location.line()
    );
    if socket_tests_required() {
        panic!("{message}. Set BULK_DOWNLOADER_REQUIRE_SOCKET_TESTS=0 to allow local skip behavior.");
    }

    eprintln!("{message}. Skipping test.");
    true
}

pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if should_skip_socket_bound_test() {
        None
    } else {
        Some(MockServer::start().await)
    }
}

/// Names of the regular entries in `dir`, sorted.
pub fn dir_entries(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("read output dir")
        .map(|entry| entry.expect("dir entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Canned behavior for one URL.
#[derive(Debug, Clone)]
pub enum Reply {
    /// 200 with the given body, optionally carrying a Content-Disposition header.
    Ok {
        body: Vec<u8>,
        content_disposition: Option<String>,
    },
    /// Headers arrive with this status and an empty body.
    Status(u16),
    /// The connection cannot be established.
    Refused,
    /// 200, some bytes, then the connection drops.
    BrokenBody { partial: Vec<u8> },
    /// Like `BrokenBody`, but before the drop `path` is replaced by a directory,
    /// so the partial file can no longer be deleted.
    BrokenBodyPathTaken { partial: Vec<u8>, path: PathBuf },
    /// 200 with headers at once; the body arrives after `delay`.
    SlowBody { body: Vec<u8>, delay: Duration },
}

/// Start/end offsets of one `fetch` call, relative to the fetcher's creation.
#[derive(Debug, Clone)]
pub struct FetchSpan {
    pub url: String,
    pub start: Duration,
    pub end: Duration,
}

/// In-process fetcher with canned replies and concurrency bookkeeping.
pub struct ScriptedFetcher {
    replies: HashMap<String, (Reply, Duration)>,
    clock: Instant,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    spans: Mutex<Vec<FetchSpan>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self {
            replies: HashMap::new(),
            clock: Instant::now(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            spans: Mutex::new(Vec::new()),
        }
    }

    /// Registers a reply delivered after `delay`.
    pub fn reply(mut self, url: &str, reply: Reply, delay: Duration) -> Self {
        self.replies.insert(url.to_string(), (reply, delay));
        self
    }

    /// Highest number of `fetch` calls that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Recorded fetch spans, in completion order.
    pub fn spans(&self) -> Vec<FetchSpan> {
        self.spans.lock().expect("spans lock").clone()
    }

    /// Span recorded for `url` (first one if fetched several times).
    pub fn span(&self, url: &str) -> FetchSpan {
        self.spans()
            .into_iter()
            .find(|span| span.url == url)
            .unwrap_or_else(|| panic!("no fetch recorded for {url}"))
    }
}

impl Default for ScriptedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, DownloadError> {
        let start = self.clock.elapsed();
        let now_running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_running, Ordering::SeqCst);

        let (reply, delay) = self.replies.get(url).cloned().unwrap_or_else(|| {
            (
                Reply::Ok {
                    body: url.as_bytes().to_vec(),
                    content_disposition: None,
                },
                Duration::ZERO,
            )
        });
        tokio::time::sleep(delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.spans.lock().expect("spans lock").push(FetchSpan {
            url: url.to_string(),
            start,
            end: self.clock.elapsed(),
        });

        match reply {
            Reply::Ok {
                body,
                content_disposition,
            } => Ok(FetchResponse {
                status: 200,
                reason: Some("OK".to_string()),
                content_disposition,
                body: stream::iter(vec![Ok(Bytes::from(body))]).boxed(),
            }),
            Reply::Status(status) => Ok(FetchResponse {
                status,
                reason: reqwest::StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .map(str::to_string),
                content_disposition: None,
                body: stream::empty().boxed(),
            }),
            Reply::Refused => Err(DownloadError::network(url, "connection refused")),
            Reply::BrokenBody { partial } => {
                let url = url.to_string();
                Ok(FetchResponse {
                    status: 200,
                    reason: Some("OK".to_string()),
                    content_disposition: None,
                    body: stream::iter(vec![
                        Ok(Bytes::from(partial)),
                        Err(DownloadError::network(url, "connection reset by peer")),
                    ])
                    .boxed(),
                })
            }
            Reply::BrokenBodyPathTaken { partial, path } => {
                let url = url.to_string();
                let drop_connection = stream::once(async move {
                    let _ = tokio::fs::remove_file(&path).await;
                    let _ = tokio::fs::create_dir(&path).await;
                    Err(DownloadError::network(url, "connection reset by peer"))
                });
                Ok(FetchResponse {
                    status: 200,
                    reason: Some("OK".to_string()),
                    content_disposition: None,
                    body: stream::iter(vec![Ok(Bytes::from(partial))])
                        .chain(drop_connection)
                        .boxed(),
                })
            }
            Reply::SlowBody { body, delay } => Ok(FetchResponse {
                status: 200,
                reason: Some("OK".to_string()),
                content_disposition: None,
                body: stream::once(async move {
                    tokio::time::sleep(delay).await;
                    Ok(Bytes::from(body))
                })
                .boxed(),
            }),
        }
    }
}

/// One captured tracing event.
#[derive(Debug, Clone)]
pub struct LoggedEvent {
    pub level: Level,
    pub message: String,
    pub fields: HashMap<String, String>,
}

impl LoggedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Tracing layer recording events in the order they were emitted.
///
/// Install with `tracing::subscriber::set_default` on a current-thread runtime
/// so events from spawned tasks are captured too.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<LoggedEvent>>>);

impl EventLog {
    pub fn events(&self) -> Vec<LoggedEvent> {
        self.0.lock().expect("event log lock").clone()
    }

    /// Index of the first event with `message` whose `field` ends with `suffix`.
    pub fn position(&self, message: &str, field: &str, suffix: &str) -> Option<usize> {
        self.events().iter().position(|event| {
            event.message == message && event.field(field).is_some_and(|v| v.ends_with(suffix))
        })
    }
}

#[derive(Default)]
struct FieldCollector {
    message: String,
    fields: HashMap<String, String>,
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.insert(field.name().to_string(), value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.insert(field.name().to_string(), format!("{value:?}"));
        }
    }
}

impl<S: Subscriber> Layer<S> for EventLog {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut collector = FieldCollector::default();
        event.record(&mut collector);
        self.0.lock().expect("event log lock").push(LoggedEvent {
            level: *event.metadata().level(),
            message: collector.message,
            fields: collector.fields,
        });
    }
}
