//! HTTP fetching for downloads.
//!
//! Download tasks talk to the network only through the [`HttpFetcher`] trait,
//! which hands back the status line, the `Content-Disposition` header and a
//! body stream. [`HttpClient`] is the reqwest-backed implementation used by
//! the binary; tests substitute their own.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::Client;
use reqwest::header::CONTENT_DISPOSITION;
use tracing::{debug, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use crate::user_agent;

/// Stream of body chunks; an `Err` item aborts the download.
pub type BodyStream = BoxStream<'static, Result<Bytes, DownloadError>>;

/// A response whose headers have arrived and whose body is still streaming.
pub struct FetchResponse {
    /// HTTP status code of the final response.
    pub status: u16,
    /// Canonical reason phrase for `status`, when one exists.
    pub reason: Option<String>,
    /// Raw `Content-Disposition` header value, if the server sent one.
    pub content_disposition: Option<String>,
    /// Response body.
    pub body: BodyStream,
}

impl fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchResponse")
            .field("status", &self.status)
            .field("reason", &self.reason)
            .field("content_disposition", &self.content_disposition)
            .finish_non_exhaustive()
    }
}

/// Capability to issue a GET and start streaming its response.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// Sends a GET for `url` and returns once response headers are available.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Network`] or [`DownloadError::InvalidUrl`] when no
    /// response could be obtained. A non-200 status is *not* an error here.
    async fn fetch(&self, url: &str) -> Result<FetchResponse, DownloadError>;
}

/// reqwest-backed [`HttpFetcher`] supporting both `http` and `https`.
///
/// Designed to be created once and shared, taking advantage of connection pooling.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with the default connect and read timeouts.
    ///
    /// # Errors
    ///
    /// Returns the reqwest error if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_connect_timeout(CONNECT_TIMEOUT_SECS)
    }

    /// Creates a client with an explicit connect timeout in seconds.
    ///
    /// There is no overall request deadline; only a stalled read between body
    /// chunks times out, so large files are never cut off.
    ///
    /// # Errors
    ///
    /// Returns the reqwest error if the TLS backend cannot be initialised.
    #[instrument(level = "debug")]
    pub fn with_connect_timeout(connect_timeout_secs: u64) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .read_timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .gzip(true)
            .user_agent(user_agent::default_download_user_agent())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetcher for HttpClient {
    #[instrument(skip(self), fields(url = %url))]
    async fn fetch(&self, url: &str) -> Result<FetchResponse, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;

        let status = response.status();
        let content_disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        debug!(status = status.as_u16(), ?content_disposition, "response headers received");

        let owned_url = url.to_string();
        let body = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| DownloadError::network(owned_url.clone(), e)))
            .boxed();

        Ok(FetchResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().map(str::to_string),
            content_disposition,
            body,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use futures_util::stream;

    use super::*;

    #[test]
    fn test_http_client_builds_with_defaults() {
        assert!(HttpClient::new().is_ok());
    }

    #[test]
    fn test_http_client_builds_with_custom_timeout() {
        assert!(HttpClient::with_connect_timeout(5).is_ok());
    }

    #[tokio::test]
    async fn test_fetch_rejects_unparsable_url() {
        let client = HttpClient::new().unwrap();
        let result = client.fetch("definitely-not-a-url").await;
        assert!(
            matches!(result, Err(DownloadError::InvalidUrl { .. })),
            "expected InvalidUrl, got: {result:?}"
        );
    }

    #[test]
    fn test_fetch_response_debug_omits_body() {
        let response = FetchResponse {
            status: 200,
            reason: Some("OK".to_string()),
            content_disposition: None,
            body: stream::empty().boxed(),
        };
        let rendered = format!("{response:?}");
        assert!(rendered.contains("200"));
        assert!(!rendered.contains("body"));
    }
}
