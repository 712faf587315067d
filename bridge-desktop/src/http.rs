//! reqwest-backed [`HttpClient`] for desktop hosts.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{parse_content_range, ByteRange, HttpClient, HttpMethod, HttpRequest, HttpResponse},
};
use futures_util::TryStreamExt;
use reqwest::{header, Client, StatusCode};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("tunevault/", env!("CARGO_PKG_VERSION"));
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Buffered requests get a per-request timeout (30 s unless the request sets
/// one). Ranged streams only get a connect timeout, since an audio file may
/// legitimately take minutes to arrive.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default reqwest client");
                Client::new()
            });

        Self { client }
    }

    /// Wrap a preconfigured client (proxies, custom TLS roots).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn convert_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }

    fn build_request(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        let method = Self::convert_method(request.method);
        let mut req = self
            .client
            .request(method, &request.url)
            .timeout(request.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT));

        for (key, value) in request.headers {
            req = req.header(key, value);
        }

        req
    }

    fn map_reqwest_error(e: reqwest::Error) -> BridgeError {
        if e.is_timeout() {
            BridgeError::Network("Request timed out".to_string())
        } else if e.is_connect() {
            BridgeError::Network(format!("Connection failed: {}", e))
        } else if e.is_body() || e.is_request() {
            BridgeError::Network(e.to_string())
        } else {
            BridgeError::OperationFailed(e.to_string())
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!(url = %request.url, "Executing HTTP request");

        let response = self
            .build_request(request)
            .send()
            .await
            .map_err(Self::map_reqwest_error)?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect();

        let body = response.bytes().await.map_err(Self::map_reqwest_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    async fn fetch_range(&self, url: &str, offset: u64) -> Result<ByteRange> {
        let mut request = self.client.get(url);
        if offset > 0 {
            request = request.header(header::RANGE, format!("bytes={}-", offset));
        }

        let response = request.send().await.map_err(Self::map_reqwest_error)?;
        let status = response.status();

        if !status.is_success() {
            return Err(BridgeError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let (start, total_len) = if status == StatusCode::PARTIAL_CONTENT {
            response
                .headers()
                .get(header::CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_content_range)
                .unwrap_or((offset, None))
        } else {
            if offset > 0 {
                warn!(url, "Server ignored range request, restarting from the beginning");
            }
            (0, response.content_length())
        };

        debug!(url, start, ?total_len, "Opened byte stream");

        let body = response
            .bytes_stream()
            .map_err(Self::map_reqwest_error);

        Ok(ByteRange {
            status: status.as_u16(),
            start,
            total_len,
            body: Box::pin(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_conversion() {
        assert_eq!(
            ReqwestHttpClient::convert_method(HttpMethod::Get),
            reqwest::Method::GET
        );
        assert_eq!(
            ReqwestHttpClient::convert_method(HttpMethod::Head),
            reqwest::Method::HEAD
        );
    }

    #[test]
    fn test_build_request_applies_default_timeout_and_headers() {
        let client = ReqwestHttpClient::new();
        let request = client
            .build_request(HttpRequest::get("https://lrclib.net/api/get").header("X-Test", "1"))
            .build()
            .unwrap();

        assert_eq!(request.timeout(), Some(&DEFAULT_REQUEST_TIMEOUT));
        assert_eq!(request.headers().get("X-Test").unwrap(), "1");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_a_network_error() {
        let client = ReqwestHttpClient::new();
        let err = client
            .fetch_range("http://127.0.0.1:9/audio.mp3", 0)
            .await
            .unwrap_err();

        assert!(err.is_transient());
    }
}
