//! HTTP Transport Module
//!
//! Executes a prepared request against the backend and hands back the raw
//! status and body. Interpreting the outcome is left to the pipeline.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

/// An outgoing call, after or before request stages have run
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Endpoint path relative to the API prefix, e.g. `matches/search`
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body,
        }
    }

    /// Look up a header, ignoring case
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set a header, replacing any existing value with the same name
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
    }
}

/// What came back over the wire
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    /// Decoded JSON, the raw text as a string when not JSON, `Null` when empty
    pub body: Value,
}

impl RawResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            content_type: Some("application/json".to_string()),
            body,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status >= 400
    }
}

/// Executes requests. Any status code counts as a response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError>;
}

/// reqwest-backed transport for the real backend
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport for `base_url` + `api_prefix` with a fixed timeout
    pub fn new(base_url: &str, api_prefix: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;

        let prefix = api_prefix.trim_matches('/');
        let base_url = if prefix.is_empty() {
            base_url.trim_end_matches('/').to_string()
        } else {
            format!("{}/{}", base_url.trim_end_matches('/'), prefix)
        };

        Ok(Self { base_url, client })
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError> {
        let url = self.url_for(&request.path);

        debug!("{} {}", request.method, url);

        let mut builder = self.client.request(request.method.clone(), &url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(TransportError::from_reqwest)?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let text = response.text().await.map_err(TransportError::from_reqwest)?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        debug!("{} {} -> {}", request.method, url, status);

        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Transport errors: no usable response was received
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Unreachable(String),

    #[error("Failed to create HTTP client: {0}")]
    Build(String),
}

impl TransportError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else {
            TransportError::Unreachable(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_header_replaces_case_insensitively() {
        let mut request = ApiRequest::new(Method::GET, "users/me", None);
        request.set_header("authorization", "Bearer old");
        request.set_header("Authorization", "Bearer new");

        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.header("AUTHORIZATION"), Some("Bearer new"));
    }

    #[test]
    fn url_joins_prefix_and_path() {
        let transport =
            HttpTransport::new("http://localhost:8080/", "/api/v1", Duration::from_secs(1)).unwrap();

        assert_eq!(
            transport.url_for("/auth/login"),
            "http://localhost:8080/api/v1/auth/login"
        );
        assert_eq!(
            transport.url_for("users/me"),
            "http://localhost:8080/api/v1/users/me"
        );
    }

    #[test]
    fn failure_threshold_is_400() {
        assert!(!RawResponse::json(204, Value::Null).is_failure());
        assert!(!RawResponse::json(399, Value::Null).is_failure());
        assert!(RawResponse::json(400, Value::Null).is_failure());
    }
}
