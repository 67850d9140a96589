use serde_json::Value;

/// Header the backend reads the caller's identity from
pub const AUTH_HEADER: &str = "user-email";

/// State captured by earlier tests and consumed by later ones.
///
/// Each field is written by the test that creates the resource and stays
/// `None` when that test fails, so dependents can skip instead of guessing.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    /// Email of the user registered by this run
    pub test_user_email: Option<String>,

    /// Identity of the logged-in user (their email)
    pub user_token: Option<String>,

    /// Identity of the administrator, only set when the backend flags the account as admin
    pub admin_token: Option<String>,

    /// Product listing cached from the catalog step
    pub products: Option<Vec<Value>>,

    pub test_product_id: Option<String>,
    pub test_ticket_id: Option<String>,
    pub checkout_session_id: Option<String>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// First cached product, if the catalog step produced a non-empty list
    pub fn first_product(&self) -> Option<&Value> {
        self.products.as_ref().and_then(|p| p.first())
    }

    pub fn user_auth(&self) -> Option<(&'static str, String)> {
        self.user_token.as_ref().map(|t| (AUTH_HEADER, t.clone()))
    }

    pub fn admin_auth(&self) -> Option<(&'static str, String)> {
        self.admin_token.as_ref().map(|t| (AUTH_HEADER, t.clone()))
    }
}

/// Render a JSON id (string or number) as a path segment
pub fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
