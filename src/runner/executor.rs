use serde_json::Value;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::context::SessionContext;
use super::events::{ConsoleEventListener, EventEmitter, TestEvent};
use super::state::{ResultLog, RunSummary, TestResult};
use crate::driver::{ApiDriver, ApiMethod, ApiRequest};
use crate::utils::config::{Config, DETAIL_SNIPPET_LEN};
use crate::utils::truncate_chars;

/// Response entity as the runner sees it. Parse failures are a variant, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    /// Non-empty body that is not valid JSON
    Raw(String),
    Empty,
}

impl ResponseBody {
    pub fn parse(text: &str) -> Self {
        if text.trim().is_empty() {
            return ResponseBody::Empty;
        }
        match serde_json::from_str(text) {
            Ok(value) => ResponseBody::Json(value),
            Err(_) => ResponseBody::Raw(text.to_string()),
        }
    }

    pub fn json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Top-level object field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.json().and_then(|v| v.as_object()).and_then(|o| o.get(key))
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        self.json().and_then(|v| v.as_array())
    }

    /// Bounded text used inside result details
    pub fn snippet(&self) -> String {
        match self {
            ResponseBody::Json(value) => truncate_chars(&value.to_string(), DETAIL_SNIPPET_LEN),
            ResponseBody::Raw(text) => truncate_chars(text, DETAIL_SNIPPET_LEN),
            ResponseBody::Empty => "<empty body>".to_string(),
        }
    }
}

/// Default `Content-Type` with caller headers layered on top (case-insensitive override)
pub fn merge_headers(extra: &[(&str, String)]) -> Vec<(String, String)> {
    let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
    for (name, value) in extra {
        match headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some(slot) => slot.1 = value.clone(),
            None => headers.push((name.to_string(), value.clone())),
        }
    }
    headers
}

/// Runs requests against the backend and records one result per test
pub struct ApiTester {
    driver: Box<dyn ApiDriver>,
    config: Config,
    context: SessionContext,
    log: ResultLog,
    session_id: String,
    emitter: Option<EventEmitter>,
    listener: Option<JoinHandle<()>>,
}

impl ApiTester {
    /// Create a tester that prints progress to the console.
    /// Must be called from within a tokio runtime.
    pub fn new(driver: Box<dyn ApiDriver>, config: Config) -> Self {
        let (emitter, receiver) = EventEmitter::new();
        let listener = tokio::spawn(ConsoleEventListener::listen(receiver));

        let mut tester = Self::without_console(driver, config);
        tester.emitter = Some(emitter);
        tester.listener = Some(listener);
        tester
    }

    /// Create a tester with no console output; events are still available via `subscribe`
    pub fn without_console(driver: Box<dyn ApiDriver>, config: Config) -> Self {
        Self {
            driver,
            config,
            context: SessionContext::new(),
            log: ResultLog::new(),
            session_id: Uuid::new_v4().to_string(),
            emitter: Some(EventEmitter::default()),
            listener: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut SessionContext {
        &mut self.context
    }

    pub fn results(&self) -> &[TestResult] {
        self.log.results()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Subscribe to test execution events
    pub fn subscribe(&self) -> Option<tokio::sync::broadcast::Receiver<TestEvent>> {
        self.emitter.as_ref().map(|e| e.subscribe())
    }

    fn emit(&self, event: TestEvent) {
        if let Some(emitter) = &self.emitter {
            emitter.emit(event);
        }
    }

    pub fn start(&self) {
        self.emit(TestEvent::SessionStarted {
            session_id: self.session_id.clone(),
            base_url: self.config.base_url.clone(),
        });
    }

    /// Append a result directly (used for checks that need no request)
    pub fn record(&mut self, name: &str, success: bool, details: String) -> bool {
        let result = self.log.record(name, success, details).clone();
        self.emit(TestEvent::TestFinished { result });
        success
    }

    /// Record an unmet precondition as a failure without touching the network
    pub fn skip(&mut self, name: &str, reason: &str) -> bool {
        log::info!("{}: skipped ({})", name, reason);
        self.record(name, false, reason.to_string())
    }

    /// Send one request and compare its status code to `expected_status`.
    ///
    /// Always records exactly one result. Transport errors become failed
    /// results; they are never propagated.
    pub async fn execute(
        &mut self,
        name: &str,
        method: ApiMethod,
        path: &str,
        expected_status: u16,
        body: Option<Value>,
        headers: &[(&str, String)],
    ) -> (bool, ResponseBody) {
        self.execute_checked(name, method, path, expected_status, body, headers, |_| Ok(()))
            .await
    }

    /// Like `execute`, but a matching status must also pass `check` on the parsed body
    #[allow(clippy::too_many_arguments)]
    pub async fn execute_checked<F>(
        &mut self,
        name: &str,
        method: ApiMethod,
        path: &str,
        expected_status: u16,
        body: Option<Value>,
        headers: &[(&str, String)],
        check: F,
    ) -> (bool, ResponseBody)
    where
        F: FnOnce(&ResponseBody) -> Result<(), String>,
    {
        let request = ApiRequest {
            method,
            url: self.config.endpoint_url(path),
            headers: merge_headers(headers),
            body: if method.carries_body() { body } else { None },
            timeout: self.config.request_timeout,
        };

        self.emit(TestEvent::TestStarted {
            name: name.to_string(),
            method,
            path: path.to_string(),
        });

        let response = match self.driver.send(&request).await {
            Ok(response) => response,
            Err(e) => {
                log::debug!("{}: {} {} failed: {}", name, method, request.url, e);
                self.record(name, false, format!("Exception: {}", e));
                return (false, ResponseBody::Empty);
            }
        };

        let parsed = ResponseBody::parse(&response.body);

        if response.status != expected_status {
            let details = format!(
                "Status: {} (expected {}), Error: {}",
                response.status,
                expected_status,
                parsed.snippet()
            );
            self.record(name, false, details);
            return (false, ResponseBody::Empty);
        }

        if let Err(reason) = check(&parsed) {
            let details = format!("Status: {}, Invalid response: {}", response.status, reason);
            self.record(name, false, details);
            return (false, parsed);
        }

        let details = match &parsed {
            ResponseBody::Json(_) => {
                format!("Status: {}, Response: {}...", response.status, parsed.snippet())
            }
            ResponseBody::Raw(_) => {
                format!("Status: {}, Body (not JSON): {}", response.status, parsed.snippet())
            }
            ResponseBody::Empty => format!("Status: {}", response.status),
        };
        self.record(name, true, details);
        (true, parsed)
    }

    /// Close the run: emit the summary, flush console output, and hand back the aggregate
    pub async fn finish(mut self) -> RunSummary {
        let summary = self.log.summary(&self.session_id);

        self.emit(TestEvent::SessionFinished {
            summary: summary.clone(),
        });

        // Dropping the only sender ends the listener loop once it has drained
        self.emitter.take();
        if let Some(listener) = self.listener.take() {
            if let Err(e) = listener.await {
                log::warn!("console listener ended abnormally: {}", e);
            }
        }

        summary
    }
}
