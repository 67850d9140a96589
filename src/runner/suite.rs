//! The fixed, ordered test sequence.
//!
//! Later steps depend on state captured by earlier ones (login needs the
//! registered email, checkout needs a cached product), so the order in
//! `run_all` is significant. A step whose precondition is missing records a
//! failure via `ApiTester::skip` and issues no request.

use chrono::{DateTime, Local};
use serde_json::{json, Value};

use super::context::id_string;
use super::executor::{ApiTester, ResponseBody};
use crate::driver::ApiMethod;
use crate::utils::config::TEST_USER_PASSWORD;

/// Throwaway identity for this run. Second granularity: two runs started in
/// the same second register the same address.
pub fn registration_email(now: DateTime<Local>) -> String {
    format!("testuser_{}@test.com", now.format("%H%M%S"))
}

/// Run every step in order. Steps never abort the sequence.
pub async fn run_all(t: &mut ApiTester) {
    t.start();

    // Basic
    health_check(t).await;

    // Auth
    user_registration(t).await;
    user_login(t).await;
    admin_login(t).await;

    // Catalog
    get_products(t).await;
    get_products_by_category(t).await;
    get_single_product(t).await;

    // Admin product management
    create_product_admin(t).await;
    update_product_admin(t).await;
    delete_product_admin(t).await;

    // Tickets
    create_ticket(t).await;
    get_user_tickets(t).await;
    get_all_tickets_admin(t).await;

    // Checkout and orders
    checkout_session(t).await;
    get_user_orders(t).await;
    get_all_orders_admin(t).await;

    if t.config().extended {
        get_ticket(t).await;
        reply_to_ticket(t).await;
        update_ticket_status_admin(t).await;
        checkout_status(t).await;
    }
}

pub async fn health_check(t: &mut ApiTester) -> bool {
    let (ok, _) = t
        .execute("Health Check", ApiMethod::Get, "", 200, None, &[])
        .await;
    ok
}

pub async fn user_registration(t: &mut ApiTester) -> bool {
    let email = registration_email(Local::now());
    let body = json!({
        "email": email,
        "password": TEST_USER_PASSWORD,
        "full_name": "Test User",
    });

    let (ok, response) = t
        .execute("User Registration", ApiMethod::Post, "auth/register", 200, Some(body), &[])
        .await;

    if ok && response.has("user") {
        log::info!("registered {}", email);
        t.context_mut().test_user_email = Some(email);
        return true;
    }
    false
}

pub async fn user_login(t: &mut ApiTester) -> bool {
    let Some(email) = t.context().test_user_email.clone() else {
        return t.skip("User Login", "No test user created");
    };

    let body = json!({ "email": email, "password": TEST_USER_PASSWORD });
    let (ok, response) = t
        .execute("User Login", ApiMethod::Post, "auth/login", 200, Some(body), &[])
        .await;

    match user_email(&response) {
        Some(token) if ok => {
            t.context_mut().user_token = Some(token);
            true
        }
        _ => false,
    }
}

pub async fn admin_login(t: &mut ApiTester) -> bool {
    let body = json!({
        "email": t.config().admin_email,
        "password": t.config().admin_password,
    });

    let (ok, response) = t
        .execute("Admin Login", ApiMethod::Post, "auth/login", 200, Some(body), &[])
        .await;

    let is_admin = response
        .get("user")
        .and_then(|u| u.get("is_admin"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    match user_email(&response) {
        Some(token) if ok && is_admin => {
            log::info!("admin identity captured");
            t.context_mut().admin_token = Some(token);
            true
        }
        _ => false,
    }
}

pub async fn get_products(t: &mut ApiTester) -> bool {
    let (ok, response) = t
        .execute("Get All Products", ApiMethod::Get, "products", 200, None, &[])
        .await;

    let Some(products) = response.as_array().filter(|_| ok).cloned() else {
        return false;
    };

    let count = products.len();
    t.context_mut().products = Some(products);
    t.record("Products Count", count > 0, format!("Found {} products", count))
}

pub async fn get_products_by_category(t: &mut ApiTester) -> bool {
    for category in t.config().categories.clone() {
        let (ok, _) = t
            .execute(
                &format!("Get Products - {}", category),
                ApiMethod::Get,
                &format!("products?category={}", category),
                200,
                None,
                &[],
            )
            .await;
        if !ok {
            return false;
        }
    }
    true
}

pub async fn get_single_product(t: &mut ApiTester) -> bool {
    let product_id = t
        .context()
        .first_product()
        .and_then(|p| p.get("id"))
        .and_then(id_string);
    let Some(product_id) = product_id else {
        return t.skip("Get Single Product", "No products available");
    };

    let (ok, _) = t
        .execute(
            "Get Single Product",
            ApiMethod::Get,
            &format!("products/{}", product_id),
            200,
            None,
            &[],
        )
        .await;
    ok
}

pub async fn create_product_admin(t: &mut ApiTester) -> bool {
    let Some(auth) = t.context().admin_auth() else {
        return t.skip("Create Product (Admin)", "No admin token");
    };

    let body = json!({
        "name": "Test Product",
        "description": "This is a test product",
        "price": 99.99,
        "category": "רכבים",
        "image_url": "https://example.com/test.jpg",
        "images": ["https://example.com/test1.jpg"],
    });

    let (ok, response) = t
        .execute("Create Product (Admin)", ApiMethod::Post, "products", 200, Some(body), &[auth])
        .await;

    match response.get("id").and_then(id_string) {
        Some(id) if ok => {
            t.context_mut().test_product_id = Some(id);
            true
        }
        _ => false,
    }
}

pub async fn update_product_admin(t: &mut ApiTester) -> bool {
    let (Some(auth), Some(product_id)) =
        (t.context().admin_auth(), t.context().test_product_id.clone())
    else {
        return t.skip("Update Product (Admin)", "No admin token or test product");
    };

    let body = json!({
        "name": "Updated Test Product",
        "description": "This is an updated test product",
        "price": 149.99,
        "category": "מפות",
        "image_url": "https://example.com/updated.jpg",
        "images": ["https://example.com/updated1.jpg"],
    });

    let (ok, _) = t
        .execute(
            "Update Product (Admin)",
            ApiMethod::Put,
            &format!("products/{}", product_id),
            200,
            Some(body),
            &[auth],
        )
        .await;
    ok
}

pub async fn delete_product_admin(t: &mut ApiTester) -> bool {
    let (Some(auth), Some(product_id)) =
        (t.context().admin_auth(), t.context().test_product_id.clone())
    else {
        return t.skip("Delete Product (Admin)", "No admin token or test product");
    };

    let (ok, _) = t
        .execute(
            "Delete Product (Admin)",
            ApiMethod::Delete,
            &format!("products/{}", product_id),
            200,
            None,
            &[auth],
        )
        .await;
    ok
}

pub async fn create_ticket(t: &mut ApiTester) -> bool {
    let Some(auth) = t.context().user_auth() else {
        return t.skip("Create Ticket", "No user token");
    };

    let body = json!({
        "subject": "Test Support Ticket",
        "message": "This is a test support ticket message",
    });

    let (ok, response) = t
        .execute("Create Ticket", ApiMethod::Post, "tickets", 200, Some(body), &[auth])
        .await;

    match response.get("id").and_then(id_string) {
        Some(id) if ok => {
            t.context_mut().test_ticket_id = Some(id);
            true
        }
        _ => false,
    }
}

pub async fn get_user_tickets(t: &mut ApiTester) -> bool {
    let Some(auth) = t.context().user_auth() else {
        return t.skip("Get User Tickets", "No user token");
    };

    let (ok, _) = t
        .execute("Get User Tickets", ApiMethod::Get, "tickets", 200, None, &[auth])
        .await;
    ok
}

pub async fn get_all_tickets_admin(t: &mut ApiTester) -> bool {
    let Some(auth) = t.context().admin_auth() else {
        return t.skip("Get All Tickets (Admin)", "No admin token");
    };

    let (ok, _) = t
        .execute("Get All Tickets (Admin)", ApiMethod::Get, "tickets/all", 200, None, &[auth])
        .await;
    ok
}

pub async fn checkout_session(t: &mut ApiTester) -> bool {
    let (Some(auth), Some(product)) =
        (t.context().user_auth(), t.context().first_product().cloned())
    else {
        return t.skip("Create Checkout Session", "No user token or products");
    };

    let body = json!({
        "items": [{
            "product_id": product.get("id").cloned().unwrap_or(Value::Null),
            "product_name": product.get("name").cloned().unwrap_or(Value::Null),
            "price": product.get("price").cloned().unwrap_or(Value::Null),
            "quantity": 1,
        }],
        "origin_url": t.config().origin_url,
    });

    let (ok, response) = t
        .execute_checked(
            "Create Checkout Session",
            ApiMethod::Post,
            "checkout/session",
            200,
            Some(body),
            &[auth],
            require_fields(&["url", "session_id"]),
        )
        .await;

    match response.get("session_id").and_then(id_string) {
        Some(session_id) if ok => {
            t.context_mut().checkout_session_id = Some(session_id);
            true
        }
        _ => false,
    }
}

pub async fn get_user_orders(t: &mut ApiTester) -> bool {
    let Some(auth) = t.context().user_auth() else {
        return t.skip("Get User Orders", "No user token");
    };

    let (ok, _) = t
        .execute("Get User Orders", ApiMethod::Get, "orders", 200, None, &[auth])
        .await;
    ok
}

pub async fn get_all_orders_admin(t: &mut ApiTester) -> bool {
    let Some(auth) = t.context().admin_auth() else {
        return t.skip("Get All Orders (Admin)", "No admin token");
    };

    let (ok, _) = t
        .execute("Get All Orders (Admin)", ApiMethod::Get, "orders/all", 200, None, &[auth])
        .await;
    ok
}

pub async fn get_ticket(t: &mut ApiTester) -> bool {
    let (Some(auth), Some(ticket_id)) =
        (t.context().user_auth(), t.context().test_ticket_id.clone())
    else {
        return t.skip("Get Ticket", "No user token or test ticket");
    };

    let (ok, _) = t
        .execute(
            "Get Ticket",
            ApiMethod::Get,
            &format!("tickets/{}", ticket_id),
            200,
            None,
            &[auth],
        )
        .await;
    ok
}

pub async fn reply_to_ticket(t: &mut ApiTester) -> bool {
    let (Some(auth), Some(ticket_id)) =
        (t.context().user_auth(), t.context().test_ticket_id.clone())
    else {
        return t.skip("Reply To Ticket", "No user token or test ticket");
    };

    let body = json!({
        "message": "Follow-up message from the API test run",
        "is_admin": false,
    });

    let (ok, _) = t
        .execute(
            "Reply To Ticket",
            ApiMethod::Post,
            &format!("tickets/{}/reply", ticket_id),
            200,
            Some(body),
            &[auth],
        )
        .await;
    ok
}

pub async fn update_ticket_status_admin(t: &mut ApiTester) -> bool {
    let (Some(auth), Some(ticket_id)) =
        (t.context().admin_auth(), t.context().test_ticket_id.clone())
    else {
        return t.skip("Update Ticket Status (Admin)", "No admin token or test ticket");
    };

    let (ok, _) = t
        .execute(
            "Update Ticket Status (Admin)",
            ApiMethod::Patch,
            &format!("tickets/{}/status?status=closed", ticket_id),
            200,
            Some(json!({})),
            &[auth],
        )
        .await;
    ok
}

pub async fn checkout_status(t: &mut ApiTester) -> bool {
    let Some(session_id) = t.context().checkout_session_id.clone() else {
        return t.skip("Get Checkout Status", "No checkout session");
    };

    let (ok, _) = t
        .execute(
            "Get Checkout Status",
            ApiMethod::Get,
            &format!("checkout/status/{}", session_id),
            200,
            None,
            &[],
        )
        .await;
    ok
}

/// `response.user.email`, the identity the backend expects back in `user-email`
fn user_email(response: &ResponseBody) -> Option<String> {
    response
        .get("user")
        .and_then(|u| u.get("email"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn require_fields(
    fields: &'static [&'static str],
) -> impl FnOnce(&ResponseBody) -> Result<(), String> {
    move |body: &ResponseBody| {
        let missing: Vec<&str> = fields.iter().copied().filter(|f| !body.has(f)).collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!("missing {}", missing.join(", ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{ApiRequest, ApiResponse, TransportError};
    use crate::runner::fake::{json_response, FakeDriver};
    use crate::utils::config::Config;
    use chrono::TimeZone;

    const BASE: &str = "http://backend.test";

    fn route(req: &ApiRequest) -> &str {
        let path = req
            .url
            .strip_prefix("http://backend.test/api/")
            .unwrap_or(req.url.as_str());
        path.split_once('?').map(|(p, _)| p).unwrap_or(path)
    }

    fn happy_backend(req: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let body_email = req
            .body
            .as_ref()
            .and_then(|b| b.get("email"))
            .cloned()
            .unwrap_or(Value::Null);

        match (req.method, route(req)) {
            (ApiMethod::Get, "") => json_response(200, json!({"message": "API is running"})),
            (ApiMethod::Post, "auth/register") => {
                json_response(200, json!({"user": {"email": body_email, "is_admin": false}}))
            }
            (ApiMethod::Post, "auth/login") => {
                let is_admin = body_email == json!("admin@relaxrp.com");
                json_response(200, json!({"user": {"email": body_email, "is_admin": is_admin}}))
            }
            (ApiMethod::Get, "products") => json_response(
                200,
                json!([{"id": "p1", "name": "Sports Car", "price": 25.0, "category": "Peds"}]),
            ),
            (ApiMethod::Post, "products") => json_response(200, json!({"id": "new-product"})),
            (ApiMethod::Get, r) | (ApiMethod::Put, r) | (ApiMethod::Delete, r)
                if r.starts_with("products/") =>
            {
                json_response(200, json!({"id": r.trim_start_matches("products/")}))
            }
            (ApiMethod::Post, "tickets") => json_response(200, json!({"id": "t1"})),
            (ApiMethod::Get, "tickets") | (ApiMethod::Get, "tickets/all") => {
                json_response(200, json!([]))
            }
            (ApiMethod::Get, "tickets/t1") => json_response(200, json!({"id": "t1"})),
            (ApiMethod::Post, "tickets/t1/reply") => json_response(200, json!({"ok": true})),
            (ApiMethod::Patch, "tickets/t1/status") => json_response(200, json!({"ok": true})),
            (ApiMethod::Post, "checkout/session") => json_response(
                200,
                json!({"url": "https://checkout.stripe.test/cs_1", "session_id": "cs_1"}),
            ),
            (ApiMethod::Get, "checkout/status/cs_1") => {
                json_response(200, json!({"status": "open", "payment_status": "unpaid"}))
            }
            (ApiMethod::Get, "orders") | (ApiMethod::Get, "orders/all") => {
                json_response(200, json!([]))
            }
            _ => json_response(404, json!({"detail": "Not Found"})),
        }
    }

    fn tester(driver: FakeDriver, extended: bool) -> ApiTester {
        let mut config = Config::default().with_base_url(BASE);
        config.extended = extended;
        ApiTester::without_console(Box::new(driver), config)
    }

    fn names(t: &ApiTester) -> Vec<String> {
        t.results().iter().map(|r| r.name.clone()).collect()
    }

    #[test]
    fn test_registration_email_uses_clock_seconds() {
        let now = Local.with_ymd_and_hms(2024, 5, 1, 9, 7, 3).unwrap();
        assert_eq!(registration_email(now), "testuser_090703@test.com");
    }

    #[tokio::test]
    async fn test_full_sequence_against_healthy_backend() {
        let (driver, calls) = FakeDriver::new(happy_backend);
        let mut t = tester(driver, false);

        run_all(&mut t).await;

        assert_eq!(
            names(&t),
            vec![
                "Health Check",
                "User Registration",
                "User Login",
                "Admin Login",
                "Get All Products",
                "Products Count",
                "Get Products - רכבים",
                "Get Products - מפות",
                "Get Products - Peds",
                "Get Single Product",
                "Create Product (Admin)",
                "Update Product (Admin)",
                "Delete Product (Admin)",
                "Create Ticket",
                "Get User Tickets",
                "Get All Tickets (Admin)",
                "Create Checkout Session",
                "Get User Orders",
                "Get All Orders (Admin)",
            ]
        );
        assert!(t.results().iter().all(|r| r.success), "{:?}", t.results());

        let ctx = t.context();
        assert!(ctx.user_token.as_deref().unwrap().starts_with("testuser_"));
        assert_eq!(ctx.admin_token.as_deref(), Some("admin@relaxrp.com"));
        assert_eq!(ctx.test_product_id.as_deref(), Some("new-product"));
        assert_eq!(ctx.test_ticket_id.as_deref(), Some("t1"));
        assert_eq!(ctx.checkout_session_id.as_deref(), Some("cs_1"));

        // Every network-backed result maps to exactly one request
        assert_eq!(calls.lock().unwrap().len(), t.results().len() - 1);

        let summary = t.finish().await;
        assert_eq!(summary.total, 19);
        assert!(summary.passes(80.0));
    }

    #[tokio::test]
    async fn test_extended_sequence_appends_ticket_and_checkout_steps() {
        let (driver, calls) = FakeDriver::new(happy_backend);
        let mut t = tester(driver, true);

        run_all(&mut t).await;

        let names = names(&t);
        assert_eq!(names.len(), 23);
        assert_eq!(
            &names[19..],
            &[
                "Get Ticket",
                "Reply To Ticket",
                "Update Ticket Status (Admin)",
                "Get Checkout Status",
            ]
        );
        assert!(t.results().iter().all(|r| r.success), "{:?}", t.results());

        let calls = calls.lock().unwrap();
        let patch = calls
            .iter()
            .find(|c| c.method == ApiMethod::Patch)
            .unwrap();
        assert_eq!(patch.url, "http://backend.test/api/tickets/t1/status?status=closed");
        assert_eq!(patch.header("user-email"), Some("admin@relaxrp.com"));
    }

    #[tokio::test]
    async fn test_unreachable_backend_records_every_planned_test() {
        let (driver, calls) = FakeDriver::new(|_| {
            Err(TransportError::ConnectionFailed("connection refused".to_string()))
        });
        let mut t = tester(driver, false);

        run_all(&mut t).await;

        // Health, register, admin login, products, first category
        assert_eq!(calls.lock().unwrap().len(), 5);
        assert_eq!(t.results().len(), 16);
        assert!(t.results().iter().all(|r| !r.success));
        assert_eq!(t.results()[2].details, "No test user created");
        assert_eq!(t.results()[5].name, "Get Products - רכבים");
        assert_eq!(t.results()[6].details, "No products available");

        let summary = t.finish().await;
        assert_eq!(summary.passed, 0);
        assert!(!summary.passes(80.0));
    }

    #[tokio::test]
    async fn test_missing_admin_flag_skips_admin_steps_without_requests() {
        let (driver, calls) = FakeDriver::new(|req| {
            if route(req) == "auth/login" {
                let email = req.body.as_ref().unwrap()["email"].clone();
                return json_response(200, json!({"user": {"email": email, "is_admin": false}}));
            }
            happy_backend(req)
        });
        let mut t = tester(driver, false);

        run_all(&mut t).await;

        assert!(t.context().admin_token.is_none());
        for name in [
            "Create Product (Admin)",
            "Get All Tickets (Admin)",
            "Get All Orders (Admin)",
        ] {
            let result = t.results().iter().find(|r| r.name == name).unwrap();
            assert!(!result.success);
            assert_eq!(result.details, "No admin token");
        }
        let update = t
            .results()
            .iter()
            .find(|r| r.name == "Update Product (Admin)")
            .unwrap();
        assert_eq!(update.details, "No admin token or test product");

        let calls = calls.lock().unwrap();
        assert!(!calls.iter().any(|c| c.url.ends_with("/all")));
        assert!(!calls
            .iter()
            .any(|c| c.header("user-email") == Some("admin@relaxrp.com")));
    }

    #[tokio::test]
    async fn test_checkout_without_session_id_fails() {
        let (driver, _) = FakeDriver::new(|req| {
            if route(req) == "checkout/session" {
                return json_response(200, json!({"url": "https://checkout.stripe.test/cs_1"}));
            }
            happy_backend(req)
        });
        let mut t = tester(driver, false);

        run_all(&mut t).await;

        let checkout = t
            .results()
            .iter()
            .find(|r| r.name == "Create Checkout Session")
            .unwrap();
        assert!(!checkout.success);
        assert_eq!(checkout.details, "Status: 200, Invalid response: missing session_id");
        assert!(t.context().checkout_session_id.is_none());
    }

    #[tokio::test]
    async fn test_checkout_request_carries_first_product() {
        let (driver, calls) = FakeDriver::new(happy_backend);
        let mut t = tester(driver, false);
        t.context_mut().user_token = Some("buyer@test.com".to_string());
        t.context_mut().products = Some(vec![json!({"id": "p9", "name": "Map", "price": 5.5})]);

        assert!(checkout_session(&mut t).await);

        let calls = calls.lock().unwrap();
        let body = calls[0].body.as_ref().unwrap();
        assert_eq!(
            body["items"],
            json!([{"product_id": "p9", "product_name": "Map", "price": 5.5, "quantity": 1}])
        );
        assert_eq!(body["origin_url"], BASE);
        assert_eq!(calls[0].header("user-email"), Some("buyer@test.com"));
    }

    #[tokio::test]
    async fn test_category_listing_stops_on_first_failure() {
        let (driver, calls) = FakeDriver::new(|req| {
            if req.url.contains("category=") {
                return json_response(500, json!({"detail": "boom"}));
            }
            happy_backend(req)
        });
        let mut t = tester(driver, false);

        assert!(!get_products_by_category(&mut t).await);
        assert_eq!(t.results().len(), 1);
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_catalog_fails_count_check() {
        let (driver, _) = FakeDriver::new(|_| json_response(200, json!([])));
        let mut t = tester(driver, false);

        assert!(!get_products(&mut t).await);
        assert_eq!(names(&t), vec!["Get All Products", "Products Count"]);
        assert!(t.results()[0].success);
        assert!(!t.results()[1].success);
        assert_eq!(t.results()[1].details, "Found 0 products");

        assert!(!get_single_product(&mut t).await);
        assert_eq!(t.results()[2].details, "No products available");
    }
}
