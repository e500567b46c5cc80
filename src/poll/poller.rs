use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::FeedConfig;
use crate::item::{RawItem, SourceEntry};
use crate::result::FetchResult;
use crate::state::FeedState;

/// Errors a transport can surface for a hard failure. Anything that comes
/// back as an HTTP status — including 304 and 4xx/5xx — is a
/// [`TransportResponse`], not an error; classification belongs to the
/// poller.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Feed body could not be parsed as RSS or Atom.
#[derive(Debug, Error)]
#[error("Parse error: {0}")]
pub struct ParseError(pub String);

/// One HTTP request as the poller hands it to the transport: conditional
/// headers already merged in, transport policy knobs from the feed config.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    /// Ordered request headers, config headers first, then the
    /// conditional-GET validators.
    pub headers: Vec<(String, String)>,
    pub timeout_seconds: u64,
    pub retries: u32,
    pub proxy: Option<String>,
}

/// What came back from the wire: final status, response headers, body.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Case-insensitive response-header lookup (first match wins).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn etag(&self) -> Option<&str> {
        self.header("etag")
    }

    pub fn last_modified(&self) -> Option<&str> {
        self.header("last-modified")
    }
}

/// The network collaborator. Must honor caller-supplied validator headers
/// (returning 304 with an empty body when the source signals no change)
/// and pass through whatever `ETag`/`Last-Modified` headers a 200 carries.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<TransportResponse, TransportError>;
}

/// The feed-format collaborator: raw bytes in, pre-normalization entry
/// records out, in document order. RSS-vs-Atom dispatch happens behind
/// this seam so fingerprinting stays format-agnostic.
pub trait FeedParser: Send + Sync {
    fn parse(
        &self,
        body: &[u8],
        feed_url: &str,
        options: &HashMap<String, String>,
    ) -> Result<Vec<SourceEntry>, ParseError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for &T {
    async fn fetch(&self, request: FetchRequest) -> Result<TransportResponse, TransportError> {
        (**self).fetch(request).await
    }
}

impl<P: FeedParser + ?Sized> FeedParser for &P {
    fn parse(
        &self,
        body: &[u8],
        feed_url: &str,
        options: &HashMap<String, String>,
    ) -> Result<Vec<SourceEntry>, ParseError> {
        (**self).parse(body, feed_url, options)
    }
}

/// The per-feed polling engine.
///
/// Stateless between calls: all per-feed history lives in the
/// [`FeedState`] the caller passes in and persists afterwards, which
/// makes concurrent polls of *different* feeds safe. Polls of the same
/// feed must be serialized by the caller — two attempts reading the same
/// previous state would both pass the backoff check and double the
/// network load.
pub struct Poller<T, P> {
    transport: T,
    parser: P,
}

impl<T: Transport, P: FeedParser> Poller<T, P> {
    pub fn new(transport: T, parser: P) -> Self {
        Self { transport, parser }
    }

    /// Performs one poll attempt for `config`, deriving the successor of
    /// `previous`.
    ///
    /// Per-attempt runtime failures never propagate: transport and parse
    /// errors are folded into an error-classified [`FetchResult`] so a
    /// scheduling loop over many feeds cannot be halted by one bad feed.
    pub async fn poll(&self, config: &FeedConfig, previous: &FeedState) -> FetchResult {
        if previous.is_in_backoff() {
            let remaining = previous.backoff_remaining();
            tracing::debug!(
                feed_id = config.id,
                backoff_remaining_secs = remaining,
                "Skipping poll, feed is backing off"
            );
            return FetchResult::skipped(config.id, previous.clone(), remaining);
        }

        let started = Instant::now();
        let request = build_request(config, previous);

        let response = match self.transport.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(feed_id = config.id, url = %config.url, error = %e, "Transport failure");
                let state = previous.with_failed_fetch(0, None);
                return FetchResult::error(config.id, state, elapsed_metrics(started));
            }
        };

        match response.status {
            200 => {
                let entries = match self.parser.parse(
                    &response.body,
                    &config.url,
                    &config.parser_options,
                ) {
                    Ok(entries) => entries,
                    Err(e) => {
                        tracing::warn!(feed_id = config.id, url = %config.url, error = %e, "Feed body unparseable");
                        let state = previous.with_failed_fetch(0, None);
                        return FetchResult::error(config.id, state, elapsed_metrics(started));
                    }
                };

                let items: Vec<RawItem> = entries.into_iter().map(RawItem::from_entry).collect();
                let state = previous.with_successful_fetch(
                    response.etag().map(str::to_owned),
                    response.last_modified().map(str::to_owned),
                    200,
                );

                let mut metrics = elapsed_metrics(started);
                metrics.insert("items".to_string(), items.len() as f64);
                tracing::debug!(feed_id = config.id, items = items.len(), "Feed fetched");
                FetchResult::success(config.id, state, items, metrics)
            }
            304 => {
                // The server sent no new validators; carry the old ones
                let state = previous.with_successful_fetch(
                    previous.etag.clone(),
                    previous.last_modified.clone(),
                    304,
                );
                tracing::debug!(feed_id = config.id, "Feed not modified");
                FetchResult::not_modified(config.id, state, elapsed_metrics(started))
            }
            status => {
                tracing::warn!(feed_id = config.id, url = %config.url, status = status, "Unexpected HTTP status");
                let state = previous.with_failed_fetch(status, None);
                FetchResult::error(config.id, state, elapsed_metrics(started))
            }
        }
    }
}

/// Merges the feed's configured headers with the conditional-GET
/// validators from the previous state.
fn build_request(config: &FeedConfig, previous: &FeedState) -> FetchRequest {
    let mut headers = config.headers.clone();
    if let Some(etag) = &previous.etag {
        headers.push(("If-None-Match".to_string(), etag.clone()));
    }
    if let Some(last_modified) = &previous.last_modified {
        headers.push(("If-Modified-Since".to_string(), last_modified.clone()));
    }
    FetchRequest {
        url: config.url.clone(),
        headers,
        timeout_seconds: config.timeout_seconds,
        retries: config.retries,
        proxy: config.proxy.clone(),
    }
}

fn elapsed_metrics(started: Instant) -> HashMap<String, f64> {
    let mut metrics = HashMap::new();
    metrics.insert(
        "elapsed_ms".to_string(),
        started.elapsed().as_secs_f64() * 1000.0,
    );
    metrics
}
