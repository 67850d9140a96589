//! reqwest-backed transport.

use async_trait::async_trait;
use reqwest::{Client, Method, Url};

use super::traits::{ApiDriver, ApiMethod, ApiRequest, ApiResponse, TransportError};

/// Talks to the backend over HTTP(S)
pub struct HttpDriver {
    client: Client,
}

impl HttpDriver {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(concat!("shop-api-tester/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;

        Ok(Self { client })
    }

    fn to_reqwest_method(method: ApiMethod) -> Method {
        match method {
            ApiMethod::Get => Method::GET,
            ApiMethod::Post => Method::POST,
            ApiMethod::Put => Method::PUT,
            ApiMethod::Delete => Method::DELETE,
            ApiMethod::Patch => Method::PATCH,
        }
    }

    fn map_error(error: reqwest::Error, timeout_ms: u64) -> TransportError {
        if error.is_timeout() {
            return TransportError::Timeout { timeout_ms };
        }
        if error.is_connect() {
            return TransportError::ConnectionFailed(error.to_string());
        }
        if error.is_builder() {
            return TransportError::InvalidUrl(error.to_string());
        }
        TransportError::Other(error.to_string())
    }
}

#[async_trait]
impl ApiDriver for HttpDriver {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = Url::parse(&request.url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", e, request.url)))?;
        let timeout_ms = request.timeout.as_millis() as u64;

        log::debug!("{} {}", request.method, url);

        let mut builder = self
            .client
            .request(Self::to_reqwest_method(request.method), url)
            .timeout(request.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if request.method.carries_body() {
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Self::map_error(e, timeout_ms))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Self::map_error(e, timeout_ms))?;

        log::debug!("<- {} ({} bytes)", status, body.len());

        Ok(ApiResponse { status, body })
    }
}
