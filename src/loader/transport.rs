//! Transports used by the data loader to fetch raw resource bytes.
//!
//! The loader only sees the [`Transport`] trait, so tests can swap in a
//! counting mock and the CLI can read extracts from disk or HTTP.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// A single failed fetch attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Non-2xx HTTP status.
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// Connection, timeout or other transport failure.
    #[error("Request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    /// Local file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Body was not valid JSON.
    #[error("Invalid JSON in {url}: {reason}")]
    Parse { url: String, reason: String },

    /// Overall per-resource deadline expired.
    #[error("Timed out loading {url}")]
    Deadline { url: String },

    /// Network disabled.
    #[error("Offline mode: {url} not fetched")]
    Offline { url: String },
}

/// Future returned by [`Transport::fetch`].
pub type FetchFuture = BoxFuture<'static, Result<Vec<u8>, FetchError>>;

/// Source of raw resource bytes.
pub trait Transport: Send + Sync {
    /// Fetch the body at `url`. Any error counts as a failed attempt.
    fn fetch(&self, url: &str) -> FetchFuture;
}

/// HTTP GET transport backed by reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with a per-request timeout.
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, url: &str) -> FetchFuture {
        let client = self.client.clone();
        let url = url.to_string();

        async move {
            debug!("GET {}", url);
            let response = client.get(&url).send().await.map_err(|e| {
                let reason = if e.is_timeout() {
                    "request timed out".to_string()
                } else if e.is_connect() {
                    "cannot connect".to_string()
                } else {
                    e.to_string()
                };
                FetchError::Request {
                    url: url.clone(),
                    reason,
                }
            })?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    url,
                    status: status.as_u16(),
                });
            }

            let body = response.bytes().await.map_err(|e| FetchError::Request {
                url: url.clone(),
                reason: e.to_string(),
            })?;
            Ok(body.to_vec())
        }
        .boxed()
    }
}

/// Reads extracts from a local directory; the URL is a file path.
#[derive(Debug, Clone, Default)]
pub struct FileTransport;

impl Transport for FileTransport {
    fn fetch(&self, url: &str) -> FetchFuture {
        let path = url.strip_prefix("file://").unwrap_or(url).to_string();

        async move {
            debug!("Reading {}", path);
            tokio::fs::read(path.clone())
                .await
                .map_err(|source| FetchError::Io { path, source })
        }
        .boxed()
    }
}

/// Transport that never reaches the network; every load falls back.
#[derive(Debug, Clone, Default)]
pub struct OfflineTransport;

impl Transport for OfflineTransport {
    fn fetch(&self, url: &str) -> FetchFuture {
        let url = url.to_string();
        async move { Err(FetchError::Offline { url }) }.boxed()
    }
}

/// Pick a transport for a source: HTTP(S) URLs go through reqwest,
/// anything else is treated as a local directory.
pub fn transport_for(source: &str, timeout: Duration) -> reqwest::Result<Box<dyn Transport>> {
    if source.starts_with("http://") || source.starts_with("https://") {
        Ok(Box::new(HttpTransport::new(timeout)?))
    } else {
        Ok(Box::new(FileTransport))
    }
}
