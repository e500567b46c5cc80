use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use crate::poll::poller::{FetchRequest, Transport, TransportError, TransportResponse};

/// Response bodies over this size are refused to bound memory use.
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// [`Transport`] backed by `reqwest`.
///
/// Owns the retry policy the poller deliberately does not have: 429 and
/// 5xx responses are retried with a short exponential delay up to the
/// request's `retries` budget, and incomplete bodies (fewer bytes than
/// Content-Length) are retried the same way. Redirects are followed by
/// the underlying client. The *final* status — 304, 4xx, exhausted-retry
/// 5xx — is returned as data for the poller to classify; only
/// network-level breakage surfaces as [`TransportError`].
///
/// `timeout_seconds` is a total per-attempt deadline enforced by the
/// client, covering headers *and* body — a server that returns headers
/// and then stalls mid-body cannot hang a fetch.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Builds a transport with a shared client.
    ///
    /// # Errors
    ///
    /// Returns the underlying builder error if TLS setup fails.
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("feedpoll/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Requests with a proxy get a one-off client; the shared client
    /// serves everything else.
    fn client_for(&self, request: &FetchRequest) -> Result<reqwest::Client, TransportError> {
        match &request.proxy {
            Some(proxy) => Ok(reqwest::Client::builder()
                .user_agent(concat!("feedpoll/", env!("CARGO_PKG_VERSION")))
                .proxy(reqwest::Proxy::all(proxy)?)
                .build()?),
            None => Ok(self.client.clone()),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: FetchRequest) -> Result<TransportResponse, TransportError> {
        let client = self.client_for(&request)?;
        let timeout = Duration::from_secs(request.timeout_seconds);
        let mut retry_count = 0u32;

        loop {
            // Per-attempt deadline on the builder: reqwest enforces it
            // across the whole exchange, including the body stream read
            // in read_limited_bytes below.
            let mut builder = client.get(&request.url).timeout(timeout);
            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }

            let response = builder.send().await.map_err(classify_reqwest_error)?;

            let status = response.status();

            // Rate limiting and server errors get a short exponential
            // backoff within this attempt; the per-feed backoff machine
            // takes over once the budget is spent.
            if (status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error())
                && retry_count < request.retries
            {
                let delay_secs = 2u64.saturating_pow(retry_count); // 2s, 4s, 8s...
                tracing::warn!(
                    url = %request.url,
                    status = status.as_u16(),
                    retry = retry_count,
                    delay_secs = delay_secs,
                    "Transient HTTP failure, retrying after delay"
                );
                tokio::time::sleep(Duration::from_secs(delay_secs)).await;
                retry_count += 1;
                continue;
            }

            let headers: Vec<(String, String)> = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect();
            let status = status.as_u16();

            match read_limited_bytes(response, MAX_FEED_SIZE).await {
                Ok(body) => {
                    return Ok(TransportResponse {
                        status,
                        headers,
                        body,
                    })
                }
                Err(TransportError::IncompleteResponse { expected, received })
                    if retry_count < request.retries =>
                {
                    let delay_secs = 2u64.saturating_pow(retry_count);
                    tracing::debug!(
                        url = %request.url,
                        expected = expected,
                        received = received,
                        retry = retry_count,
                        delay_secs = delay_secs,
                        "Retrying incomplete download"
                    );
                    tokio::time::sleep(Duration::from_secs(delay_secs)).await;
                    retry_count += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// reqwest reports a blown request deadline as an ordinary error; pull
/// it back out so callers see [`TransportError::Timeout`] whether the
/// deadline expired before the headers or mid-body.
fn classify_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(e)
    }
}

/// Streams the body with a hard size cap and a Content-Length
/// completeness check, so a lying or interrupted server can neither
/// exhaust memory nor hand us a silently truncated document.
async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, TransportError> {
    let expected_length = response.content_length();

    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(TransportError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(classify_reqwest_error)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(TransportError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(TransportError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
