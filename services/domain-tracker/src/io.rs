//! HTTP client abstraction for testability

use std::time::Duration;

use async_trait::async_trait;

/// Upper bound on any single request, including reading the body
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP response from a request
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Abstraction over HTTP client for dependency injection
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait HttpClient: Send + Sync {
    /// Send a GET request with the given query parameters
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> crate::Result<HttpResponse>;

    /// Send a POST request with a JSON body
    async fn post_json(&self, url: &str, body: &serde_json::Value)
        -> crate::Result<HttpResponse>;
}

/// Production HTTP client using reqwest
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    /// Client whose requests fail with a transport error after `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });
        Self { client }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> crate::Result<HttpResponse> {
        // Query values may carry the access token, so only the URL is logged.
        tracing::debug!("GET {} ({} params)", url, query.len());
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                crate::TrackerError::Transport(format!(
                    "GET {} failed: {}",
                    url,
                    e.without_url()
                ))
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            crate::TrackerError::Transport(format!("Reading response body: {}", e.without_url()))
        })?;

        tracing::debug!("GET {} -> {} ({} bytes)", url, status, body.len());
        Ok(HttpResponse { status, body })
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> crate::Result<HttpResponse> {
        tracing::debug!("POST {}", redact_path(url));
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                crate::TrackerError::Transport(format!(
                    "POST {} failed: {}",
                    redact_path(url),
                    e.without_url()
                ))
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            crate::TrackerError::Transport(format!("Reading response body: {}", e.without_url()))
        })?;

        tracing::debug!("POST {} -> {} ({} bytes)", redact_path(url), status, body.len());
        Ok(HttpResponse { status, body })
    }
}

/// Scheme and authority of `url` only. Webhook paths often embed secret ids.
fn redact_path(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => match parsed.port() {
                Some(port) => format!("{}://{}:{}/...", parsed.scheme(), host, port),
                None => format!("{}://{}/...", parsed.scheme(), host),
            },
            None => "<url>".to_string(),
        },
        Err(_) => "<url>".to_string(),
    }
}
