//! Scripted in-memory transport for unit tests.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};

use crate::driver::{ApiDriver, ApiRequest, ApiResponse, TransportError};

type Handler = dyn Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync;

/// Answers every request through a closure and keeps a log of what was sent
pub struct FakeDriver {
    handler: Box<Handler>,
    calls: Arc<Mutex<Vec<ApiRequest>>>,
}

impl FakeDriver {
    pub fn new<F>(handler: F) -> (Self, Arc<Mutex<Vec<ApiRequest>>>)
    where
        F: Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync + 'static,
    {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let driver = Self {
            handler: Box::new(handler),
            calls: calls.clone(),
        };
        (driver, calls)
    }
}

#[async_trait]
impl ApiDriver for FakeDriver {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        self.calls.lock().unwrap().push(request.clone());
        (self.handler)(request)
    }
}

pub fn json_response(status: u16, body: Value) -> Result<ApiResponse, TransportError> {
    Ok(ApiResponse {
        status,
        body: body.to_string(),
    })
}

pub fn text_response(status: u16, body: &str) -> Result<ApiResponse, TransportError> {
    Ok(ApiResponse {
        status,
        body: body.to_string(),
    })
}
