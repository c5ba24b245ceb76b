//! HTTP client adapter for the API under test.
//!
//! The engine talks to the API only through the [`Transport`] trait. The
//! production implementation, [`HttpClient`], is a thin `reqwest` wrapper that
//! issues exactly one attempt per call and normalizes the outcome:
//!
//! - any HTTP response, whatever its status, is an [`ApiResponse`];
//! - anything that prevented a response (refused connection, DNS, timeout,
//!   malformed URL) is a [`NetworkFailure`].
//!
//! A 404 is therefore a result the caller interprets, not an error.

use crate::config::TestConfig;
use crate::models::HttpMethod;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::Value;
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Errors raised while constructing the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The underlying HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Coarse signature of a network-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkErrorCode {
    /// Nothing is listening on the target port.
    ConnectionRefused,
    /// The request did not complete within the configured timeout.
    Timeout,
    /// The host name could not be resolved.
    Dns,
    /// The request URL could not be built from the configuration.
    InvalidUrl,
    /// Any other transport failure.
    Other,
}

impl NetworkErrorCode {
    /// Short, conventional code string shown in diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            NetworkErrorCode::ConnectionRefused => "ECONNREFUSED",
            NetworkErrorCode::Timeout => "ETIMEDOUT",
            NetworkErrorCode::Dns => "ENOTFOUND",
            NetworkErrorCode::InvalidUrl => "EINVALIDURL",
            NetworkErrorCode::Other => "EUNKNOWN",
        }
    }
}

impl fmt::Display for NetworkErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request that never produced an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct NetworkFailure {
    pub message: String,
    pub code: Option<NetworkErrorCode>,
}

impl NetworkFailure {
    pub fn new(message: impl Into<String>, code: NetworkErrorCode) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }

    /// Connection refused, as produced when the API is not running.
    pub fn refused(message: impl Into<String>) -> Self {
        Self::new(message, NetworkErrorCode::ConnectionRefused)
    }
}

/// A normalized HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed JSON body; `Null` when empty, a JSON string when not JSON.
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The resource payload, unwrapping a `{"data": ...}` envelope if present.
    pub fn data(&self) -> &Value {
        match self.body.get("data") {
            Some(inner) if !inner.is_null() => inner,
            _ => &self.body,
        }
    }
}

/// Issues requests against the API root (base URL plus prefix).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one request. `path` is relative to the API root, e.g. `/authors/3`.
    async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse, NetworkFailure>;
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// `reqwest`-backed transport with JSON content negotiation and a per-request
/// timeout.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    api_root: String,
}

impl HttpClient {
    /// Builds a client for the API described by `config`.
    pub fn new(config: &TestConfig) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            api_root: config.api_root(),
        })
    }

    /// Returns the absolute URL for a contract path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_root, path)
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse, NetworkFailure> {
        let raw_url = self.url(path);
        let url = reqwest::Url::parse(&raw_url).map_err(|e| {
            NetworkFailure::new(
                format!("Invalid URL `{raw_url}`: {e}"),
                NetworkErrorCode::InvalidUrl,
            )
        })?;

        debug!(%method, %url, "sending request");

        let mut request = self.client.request(method.into(), url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| network_failure(&e))?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(|e| network_failure(&e))?;

        debug!(%method, path, status, bytes = bytes.len(), "received response");

        Ok(ApiResponse::new(status, parse_body(&bytes)))
    }
}

/// Parses a response body: JSON when possible, otherwise the raw text.
fn parse_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// Converts a `reqwest` error into a tagged network failure, keeping the full
/// source chain in the message.
fn network_failure(err: &reqwest::Error) -> NetworkFailure {
    let mut message = err.to_string();
    let mut code = None;

    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        if let Some(io) = cause.downcast_ref::<std::io::Error>()
            && io.kind() == std::io::ErrorKind::ConnectionRefused
        {
            code = Some(NetworkErrorCode::ConnectionRefused);
        }
        source = cause.source();
    }

    let lowered = message.to_lowercase();
    let code = code.unwrap_or_else(|| {
        if err.is_timeout() {
            NetworkErrorCode::Timeout
        } else if lowered.contains("dns error") || lowered.contains("failed to lookup address") {
            NetworkErrorCode::Dns
        } else if err.is_connect() && lowered.contains("refused") {
            NetworkErrorCode::ConnectionRefused
        } else if err.is_builder() {
            NetworkErrorCode::InvalidUrl
        } else {
            NetworkErrorCode::Other
        }
    });

    NetworkFailure {
        message,
        code: Some(code),
    }
}
