use crate::feed::parser::{parse_feed, ParseError, ParsedFeed};
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

/// User-Agent sent with every feed request unless overridden in config.
pub const DEFAULT_USER_AGENT: &str = concat!("gator/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Transport-level failures. All of these are worth retrying later.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Errors returned by [`fetch_feed`].
#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// Structurally invalid document (malformed XML, no `rss > channel`)
    #[error("Invalid RSS feed format: {0}")]
    Format(String),
    /// Channel metadata missing or not text
    #[error("Invalid RSS feed: {0}")]
    Validation(String),
}

impl From<ParseError> for FeedError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Format(msg) => FeedError::Format(msg),
            ParseError::Validation(msg) => FeedError::Validation(msg),
        }
    }
}

impl FeedError {
    /// Only transport failures can succeed on a later attempt against the same URL.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FeedError::Fetch(_))
    }
}

/// Builds the HTTP client used for feed requests.
///
/// The client carries the identifying User-Agent and a request timeout, so a
/// stalled server can never block a caller indefinitely.
pub fn build_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client, FetchError> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .pool_idle_timeout(Duration::from_secs(30))
        .build()
        .map_err(FetchError::Network)
}

/// Fetches a feed URL and decodes it into a [`ParsedFeed`].
///
/// Makes exactly one request; retrying is left to the caller, guided by
/// [`FeedError::is_retryable`]. The whole download (headers and body) is
/// bounded by `timeout`. Nothing is persisted.
///
/// # Errors
///
/// - [`FeedError::Fetch`] - network failure, timeout, non-2xx status, or
///   oversized/incomplete body
/// - [`FeedError::Format`] - malformed XML or missing `rss > channel`
/// - [`FeedError::Validation`] - channel `title`, `link` or `description` missing
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<ParsedFeed, FeedError> {
    tracing::debug!(url = %url, timeout_ms = timeout.as_millis() as u64, "Fetching feed");

    let bytes = tokio::time::timeout(timeout, download(client, url))
        .await
        .map_err(|_| FetchError::Timeout)??;

    let feed = parse_feed(&bytes).inspect_err(|e| {
        tracing::warn!(url = %url, error = %e, "Feed document rejected");
    })?;

    tracing::info!(
        url = %url,
        title = %feed.channel.title,
        items = feed.channel.items.len(),
        "Fetched feed"
    );
    Ok(feed)
}

async fn download(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let response = client.get(url).send().await.map_err(classify)?;

    // EDGE-002: Validate HTTP status before reading the body
    if !response.status().is_success() {
        tracing::warn!(url = %url, status = %response.status(), "Feed request failed");
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    read_limited_bytes(response, MAX_FEED_SIZE).await
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(err)
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(classify)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    // EDGE-005: received fewer bytes than Content-Length
    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
