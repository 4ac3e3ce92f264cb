//! Concurrent batch content fetcher.
//!
//! Each ledger record points at a post document served by the content
//! gateway at `{gateway}/{id}`. A batch issues every request concurrently,
//! bounded by a semaphore so a large page doesn't hammer the gateway, and
//! waits for all of them. Failures are isolated per id: a timeout, HTTP
//! error, or malformed body becomes a [`ContentResult::Failed`] for that id
//! and never cancels or fails its siblings.
//!
//! Results come back in input order regardless of completion order, so the
//! content log stays reproducible across runs.

use crate::engine::ContentSource;
use crate::error::Result;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use vellum_core::{ContentError, ContentResult, Document};

/// Configuration for the content fetcher.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Content gateway base URL; documents live at `{gateway}/{id}`.
    pub gateway: String,

    /// Per-request timeout. The only bound on an individual stuck request;
    /// there is no mid-batch cancellation.
    pub timeout: Duration,

    /// Maximum concurrent in-flight requests per batch.
    pub max_in_flight: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            gateway: "https://arweave.net".to_string(),
            timeout: Duration::from_secs(30),
            max_in_flight: 16,
        }
    }
}

/// Fetches post documents for batches of transaction ids.
pub struct ContentFetcher {
    http: reqwest::Client,
    config: FetcherConfig,
}

impl ContentFetcher {
    /// Create a fetcher with the given configuration.
    pub fn new(config: FetcherConfig) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http, config })
    }

    /// Fetch content for every id, concurrently.
    ///
    /// Totality guarantee: the result has exactly one entry per input id, in
    /// input order. An empty input makes no requests at all.
    pub async fn fetch_batch(&self, ids: &[String]) -> Vec<ContentResult> {
        if ids.is_empty() {
            return Vec::new();
        }

        debug!(batch = ids.len(), "fetching content batch");
        let semaphore = Arc::new(Semaphore::new(self.config.max_in_flight.max(1)));

        let requests = ids.iter().map(|id| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return ContentResult::Failed(ContentError::new(
                            id.clone(),
                            None,
                            "fetch pool closed unexpectedly",
                        ));
                    }
                };
                self.fetch_one(id).await
            }
        });

        // join_all preserves input order, whatever order requests finish in
        join_all(requests).await
    }

    /// Fetch and parse one document. Never returns an error — every failure
    /// mode becomes a [`ContentResult::Failed`].
    async fn fetch_one(&self, id: &str) -> ContentResult {
        let url = format!("{}/{}", self.config.gateway.trim_end_matches('/'), id);

        let resp = match self.http.get(&url).timeout(self.config.timeout).send().await {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => {
                warn!(id, "content fetch timed out");
                return ContentResult::Failed(ContentError::timeout(id));
            }
            Err(e) => {
                warn!(id, error = %e, "content fetch failed");
                return ContentResult::Failed(ContentError::new(
                    id,
                    None,
                    format!("request failed: {e}"),
                ));
            }
        };

        let status = resp.status();
        if !status.is_success() {
            warn!(id, status = status.as_u16(), "gateway returned error status");
            return ContentResult::Failed(ContentError::new(
                id,
                Some(status.as_u16()),
                status.canonical_reason().unwrap_or("HTTP error"),
            ));
        }

        let body: Value = match resp.json().await {
            Ok(value) => value,
            Err(e) if e.is_timeout() => {
                warn!(id, "content body read timed out");
                return ContentResult::Failed(ContentError::timeout(id));
            }
            Err(e) => {
                return ContentResult::Failed(ContentError::new(
                    id,
                    None,
                    format!("invalid JSON body: {e}"),
                ));
            }
        };

        match Document::from_response(id, &body) {
            Ok(doc) => ContentResult::Fetched(doc),
            Err(e) => {
                warn!(id, error = %e, "gateway response missing document fields");
                ContentResult::Failed(ContentError::new(
                    id,
                    None,
                    format!("malformed content: {e}"),
                ))
            }
        }
    }
}

impl ContentSource for ContentFetcher {
    async fn fetch_batch(&self, ids: &[String]) -> Vec<ContentResult> {
        ContentFetcher::fetch_batch(self, ids).await
    }
}
