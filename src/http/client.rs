//! HTTP client for load-test workloads
//!
//! Thin wrapper over reqwest that measures request duration and captures
//! status, headers and body for checks and logging.

use anyhow::{Context, Result};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client, Method,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Request headers, kept sorted so logged header dumps are stable
pub type Headers = BTreeMap<String, String>;

/// HTTP client errors
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Connection refused to {0}")]
    ConnectionRefused(String),

    /// The request could not be built (bad URL or header value)
    #[error("Invalid request to {url}: {reason}")]
    InvalidRequest { url: String, reason: String },
}

/// HTTP client shared by every virtual user
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    default_headers: HeaderMap,
    timeout_secs: u64,
}

impl HttpClient {
    /// Create a new HTTP client with the default 60s request timeout
    #[cfg(test)]
    pub fn new() -> Result<Self> {
        Self::with_timeout(60)
    }

    /// Create client with custom timeout
    #[cfg(test)]
    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        Self::build(timeout_secs, false)
    }

    /// Create client with custom timeout and optional TLS verification bypass
    pub fn build(timeout_secs: u64, insecure: bool) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .danger_accept_invalid_certs(insecure)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            default_headers: HeaderMap::new(),
            timeout_secs,
        })
    }

    /// Add default header
    pub fn default_header(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let header_name =
            HeaderName::from_bytes(key.as_ref().as_bytes()).context("Invalid header name")?;
        let header_value = HeaderValue::from_str(value.as_ref()).context("Invalid header value")?;
        self.default_headers.insert(header_name, header_value);
        Ok(self)
    }

    /// Send HTTP request
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = request.url;
        debug!("Sending {} request to {}", request.method, url);

        let method =
            Method::from_bytes(request.method.as_bytes()).context("Invalid HTTP method")?;

        let mut req_builder = self.client.request(method, &url);

        for (key, value) in &self.default_headers {
            req_builder = req_builder.header(key, value);
        }

        for (key, value) in &request.headers {
            req_builder = req_builder.header(key.as_str(), value.as_str());
        }

        if let Some(body) = request.body {
            req_builder = req_builder.body(body);
        }

        let start = Instant::now();

        let response = req_builder.send().await.map_err(|e| {
            if e.is_timeout() {
                anyhow::anyhow!(HttpError::Timeout(self.timeout_secs))
            } else if e.is_connect() {
                anyhow::anyhow!(HttpError::ConnectionRefused(url.clone()))
            } else if e.is_builder() {
                anyhow::anyhow!(HttpError::InvalidRequest {
                    url: url.clone(),
                    reason: std::error::Error::source(&e)
                        .map(|source| source.to_string())
                        .unwrap_or_else(|| e.to_string()),
                })
            } else {
                anyhow::anyhow!(HttpError::RequestFailed(e.to_string()))
            }
        })?;

        let status = response.status();

        let mut response_headers = HashMap::new();
        for (key, value) in response.headers().iter() {
            if let Ok(v) = value.to_str() {
                response_headers.insert(key.to_string(), v.to_string());
            }
        }

        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        // Duration covers the full exchange, body included.
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        debug!(
            "Response: {} {} in {:.2}ms",
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            duration_ms
        );

        Ok(HttpResponse {
            status_code: status.as_u16(),
            headers: response_headers,
            body,
            duration_ms,
        })
    }

    /// GET with custom headers
    pub async fn get_with_headers(&self, url: &str, headers: &Headers) -> Result<HttpResponse> {
        self.send(HttpRequest::get(url).headers(headers.clone()))
            .await
    }

    /// POST a JSON payload with custom headers
    pub async fn post_json<T: Serialize>(
        &self,
        url: &str,
        headers: &Headers,
        payload: &T,
    ) -> Result<HttpResponse> {
        let body = serde_json::to_string(payload).context("Failed to serialize request body")?;
        self.send(HttpRequest::post(url).headers(headers.clone()).body(body))
            .await
    }
}

/// HTTP request builder
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: Headers,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Headers::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new("POST", url)
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// HTTP response
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub duration_ms: f64,
}

impl HttpResponse {
    /// Whether the request counts as successful for `http_req_failed`
    pub fn is_expected(&self) -> bool {
        (200..400).contains(&self.status_code)
    }

    /// Parse the body as JSON
    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }

    /// Look up a dotted path (`data.access_token`, `items.0.id`) in the JSON body
    pub fn json_path(&self, path: &str) -> Option<Value> {
        let root = self.json()?;
        lookup_path(&root, path).cloned()
    }
}

/// Walk a dotted path through objects and arrays
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}
