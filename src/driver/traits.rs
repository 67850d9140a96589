use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// HTTP verbs the harness issues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl ApiMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiMethod::Get => "GET",
            ApiMethod::Post => "POST",
            ApiMethod::Put => "PUT",
            ApiMethod::Delete => "DELETE",
            ApiMethod::Patch => "PATCH",
        }
    }

    /// Whether a JSON entity is sent for this verb
    pub fn carries_body(&self) -> bool {
        matches!(self, ApiMethod::Post | ApiMethod::Put | ApiMethod::Patch)
    }
}

impl fmt::Display for ApiMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved request, ready for the wire
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: ApiMethod,
    pub url: String,
    /// Header pairs in send order; names are unique case-insensitively
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    pub timeout: Duration,
}

impl ApiRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Raw response as observed on the wire
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

/// Failures below the HTTP layer. The request never produced a status code.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("{0}")]
    Other(String),
}

/// Transport used by the runner to reach the backend
#[async_trait]
pub trait ApiDriver: Send + Sync {
    /// Send one request and wait for the full response body
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}
