//! HTTP seam between the core and the host.
//!
//! Two shapes of traffic: small buffered GETs for lyrics provider APIs, and
//! ranged byte streams for resumable asset transfers.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::error::{BridgeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

/// Fully buffered response. Any status, including errors, lands here.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| BridgeError::OperationFailed(format!("Malformed JSON body: {}", e)))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 5xx or 429: worth another attempt after a pause.
    pub fn is_retryable(&self) -> bool {
        self.status == 429 || (500..600).contains(&self.status)
    }
}

/// Chunked response body.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Body of a (possibly) ranged GET.
pub struct ByteRange {
    pub status: u16,
    /// Offset of the first body byte within the resource. Zero when the
    /// server ignored the `Range` header and sent the whole resource.
    pub start: u64,
    /// Full resource length when the server reported it.
    pub total_len: Option<u64>,
    pub body: ByteStream,
}

impl ByteRange {
    /// True when the server honoured a non-zero range request.
    pub fn is_partial(&self) -> bool {
        self.status == 206 && self.start > 0
    }
}

impl fmt::Debug for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteRange")
            .field("status", &self.status)
            .field("start", &self.start)
            .field("total_len", &self.total_len)
            .finish_non_exhaustive()
    }
}

/// Parses a `Content-Range: bytes start-end/total` header into
/// `(start, total)`. The total is `None` for `*`.
pub fn parse_content_range(value: &str) -> Option<(u64, Option<u64>)> {
    let spec = value.trim().strip_prefix("bytes")?.trim();
    let (range, total) = spec.split_once('/')?;
    let (start, _end) = range.split_once('-')?;
    let start = start.trim().parse().ok()?;
    let total = total.trim().parse().ok();
    Some((start, total))
}

/// Exponential backoff for [`HttpClient::execute_with_retry`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    /// Pause before the first retry; doubled for each later one
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Pause after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Host HTTP stack.
///
/// Provider adapters use [`execute`](HttpClient::execute) for small JSON or
/// text payloads. Asset transfers use [`fetch_range`](HttpClient::fetch_range)
/// so a paused transfer can reopen the resource at its saved offset.
///
/// ```ignore
/// use bridge_traits::http::{HttpClient, HttpRequest, RetryPolicy};
///
/// async fn lookup(client: &dyn HttpClient) -> Result<serde_json::Value> {
///     let request = HttpRequest::get("https://lrclib.net/api/get?track_name=Blue&artist_name=Joni");
///     client.execute_with_retry(request, RetryPolicy::default()).await?.json()
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send `request` and buffer the body. Only transport failures are errors.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// [`execute`](Self::execute), repeated while the outcome is a transient
    /// transport error or a retryable status and attempts remain.
    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = self.execute(request.clone()).await;
            let retryable = match &outcome {
                Ok(response) => response.is_retryable(),
                Err(err) => err.is_transient(),
            };
            if !retryable || attempt >= policy.max_attempts {
                return outcome;
            }
            core_async::time::sleep(policy.delay_for(attempt)).await;
        }
    }

    /// Open a GET stream for `url` starting at byte `offset`.
    ///
    /// Implementations send `Range: bytes={offset}-` when `offset > 0` and
    /// report in [`ByteRange::start`] where the body actually begins, so a
    /// server that ignores ranges yields `start == 0`. Non-2xx statuses are
    /// errors.
    async fn fetch_range(&self, url: &str, offset: u64) -> Result<ByteRange>;
}
