use std::time::Duration;

/// Deployment the harness targets when no override is given
pub const DEFAULT_BASE_URL: &str = "https://rpshop-official.preview.emergentagent.com";

/// Path segment every endpoint lives under
pub const API_PREFIX: &str = "api";

/// Per-request timeout
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A run passes only when its success rate is strictly above this percentage
pub const PASS_THRESHOLD: f64 = 80.0;

/// Upper bound (in chars) for response snippets embedded in result details
pub const DETAIL_SNIPPET_LEN: usize = 200;

/// Password used for the throwaway user registered by each run
pub const TEST_USER_PASSWORD: &str = "TestPass123!";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Scheme + host of the backend, without trailing slash
    pub base_url: String,

    /// Timeout applied to every request
    pub request_timeout: Duration,

    /// Success-rate percentage a run must exceed
    pub pass_threshold: f64,

    /// Seeded administrator account
    pub admin_email: String,
    pub admin_password: String,

    /// Category labels queried by the category listing step
    pub categories: Vec<String>,

    /// Origin sent with checkout requests (payment provider redirects back here)
    pub origin_url: String,

    /// Run the ticket detail/reply/status and checkout status steps too
    pub extended: bool,
}

impl Config {
    /// Point the harness at another deployment
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let trimmed = base_url.trim_end_matches('/').to_string();
        self.origin_url = trimmed.clone();
        self.base_url = trimmed;
        self
    }

    /// Full URL for an endpoint path relative to the API prefix
    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, API_PREFIX, path)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: REQUEST_TIMEOUT,
            pass_threshold: PASS_THRESHOLD,
            admin_email: "admin@relaxrp.com".to_string(),
            admin_password: "admin123".to_string(),
            categories: vec!["רכבים".to_string(), "מפות".to_string(), "Peds".to_string()],
            origin_url: DEFAULT_BASE_URL.to_string(),
            extended: false,
        }
    }
}
