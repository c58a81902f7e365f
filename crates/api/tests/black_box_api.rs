use std::str::FromStr;

use billdesk_auth::JwtClaims;
use billdesk_infra::AppConfig;
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::Value;

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory stores, ephemeral port.
        let app = billdesk_api::app::build_app(&AppConfig::in_memory(SECRET))
            .await
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(username: &str, issued_at: chrono::DateTime<Utc>, ttl: ChronoDuration) -> String {
    let claims = JwtClaims::for_user(username, issued_at, ttl);
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn dec(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).unwrap(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).unwrap(),
        other => panic!("not a decimal: {other}"),
    }
}

async fn signup_and_login(server: &TestServer, client: &reqwest::Client, username: &str) -> String {
    let email = format!("{username}@example.com");
    let res = client
        .post(server.url("/signup"))
        .form(&[
            ("name", "Test Clerk"),
            ("username", username),
            ("email", email.as_str()),
            ("password", "correct-horse"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .post(server.url("/login"))
        .form(&[("username", username), ("password", "correct-horse")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["token_type"], "Bearer");
    body["token"].as_str().unwrap().to_string()
}

async fn create_item(
    server: &TestServer,
    client: &reqwest::Client,
    token: &str,
    name: &str,
    price: &str,
    stock: &str,
) -> Value {
    let res = client
        .post(server.url("/items"))
        .bearer_auth(token)
        .form(&[("name", name), ("price", price), ("stock_quantity", stock)])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    res.json().await.unwrap()
}

async fn create_customer(server: &TestServer, client: &reqwest::Client, token: &str, name: &str) -> Value {
    let res = client
        .post(server.url("/customers"))
        .bearer_auth(token)
        .form(&[
            ("name", name),
            ("address", "1 Main St"),
            ("telephone", "+1 555-0100"),
            ("email", "buyer@example.com"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    res.json().await.unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let server = TestServer::spawn().await;
    let res = reqwest::get(server.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn protected_routes_require_authentication() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    for path in ["/whoami", "/home", "/customers", "/items", "/bills"] {
        let res = client.get(server.url(path)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{path}");
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"], "unauthorized");
    }

    let res = client
        .get(server.url("/whoami"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_or_foreign_tokens_are_rejected() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let expired = mint_jwt("jo", Utc::now() - ChronoDuration::hours(2), ChronoDuration::minutes(10));
    let res = client
        .get(server.url("/whoami"))
        .bearer_auth(expired)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let foreign = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &JwtClaims::for_user("jo", Utc::now(), ChronoDuration::minutes(10)),
        &EncodingKey::from_secret(b"some-other-secret"),
    )
    .unwrap();
    let res = client
        .get(server.url("/whoami"))
        .bearer_auth(foreign)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let valid = mint_jwt("jo", Utc::now(), ChronoDuration::minutes(10));
    let res = client
        .get(server.url("/whoami"))
        .bearer_auth(valid)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn signup_login_and_whoami_with_bearer_token() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = signup_and_login(&server, &client, "clerk").await;

    let res = client
        .get(server.url("/whoami"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["username"], "clerk");
}

#[tokio::test]
async fn bad_credentials_get_the_same_answer() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    signup_and_login(&server, &client, "clerk").await;

    let wrong_password = client
        .post(server.url("/login"))
        .form(&[("username", "clerk"), ("password", "wrong-horse")])
        .send()
        .await
        .unwrap();
    let unknown_user = client
        .post(server.url("/login"))
        .form(&[("username", "nobody"), ("password", "correct-horse")])
        .send()
        .await
        .unwrap();

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);
    let a: Value = wrong_password.json().await.unwrap();
    let b: Value = unknown_user.json().await.unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn duplicate_signup_is_a_conflict() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    signup_and_login(&server, &client, "clerk").await;

    let res = client
        .post(server.url("/signup"))
        .form(&[
            ("name", "Other"),
            ("username", "clerk"),
            ("email", "other@example.com"),
            ("password", "correct-horse"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "duplicate_key");
}

#[tokio::test]
async fn session_cookie_authenticates_until_logout() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::builder().cookie_store(true).build().unwrap();
    signup_and_login(&server, &client, "clerk").await;

    // No Authorization header: the cookie set by /login carries the session.
    let res = client.get(server.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.post(server.url("/logout")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client.get(server.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn customer_lifecycle() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = signup_and_login(&server, &client, "clerk").await;

    let customer = create_customer(&server, &client, &token, "Acme Ltd").await;
    let id = customer["id"].as_str().unwrap().to_string();
    let account = customer["account_number"].as_str().unwrap();
    assert!(account.starts_with("ACC-"));
    assert_eq!(account.len(), "ACC-YYYYMMDD-XXXX".len());

    let res = client
        .get(server.url("/customers/search?query=acme"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let page: Value = res.json().await.unwrap();
    assert_eq!(page["total_elements"], 1);

    let res = client
        .post(server.url(&format!("/customers/{id}/address")))
        .bearer_auth(&token)
        .form(&[("address", "2 Side St")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["address"], "2 Side St");
    assert_eq!(updated["account_number"], customer["account_number"]);

    let res = client
        .post(server.url(&format!("/customers/{id}/contact")))
        .bearer_auth(&token)
        .form(&[("telephone", "letters-only")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(server.url(&format!("/customers/{id}/delete")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .get(server.url(&format!("/customers/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_ids_and_sort_fields_are_bad_requests() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = signup_and_login(&server, &client, "clerk").await;

    let res = client
        .get(server.url("/bills/not-a-uuid"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .get(server.url("/customers?sort_by=password"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn item_stock_drives_status() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = signup_and_login(&server, &client, "clerk").await;

    let item = create_item(&server, &client, &token, "Widget", "4.25", "3").await;
    let id = item["id"].as_str().unwrap().to_string();
    assert!(item["item_code"].as_str().unwrap().starts_with("ITM-"));
    assert_eq!(item["status"], "ACTIVE");

    let res = client
        .post(server.url(&format!("/items/{id}/stock")))
        .bearer_auth(&token)
        .form(&[("stock_quantity", "0")])
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "OUT_OF_STOCK");

    let res = client
        .post(server.url(&format!("/items/{id}/stock")))
        .bearer_auth(&token)
        .form(&[("stock_quantity", "5")])
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ACTIVE");

    let res = client
        .get(server.url("/items/low-stock?threshold=5"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn duplicate_item_code_is_a_conflict() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = signup_and_login(&server, &client, "clerk").await;

    for (name, expected) in [("First", StatusCode::CREATED), ("Second", StatusCode::CONFLICT)] {
        let res = client
            .post(server.url("/items"))
            .bearer_auth(&token)
            .form(&[
                ("item_code", "SKU-1"),
                ("name", name),
                ("price", "1.00"),
                ("stock_quantity", "1"),
            ])
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), expected);
        if expected == StatusCode::CONFLICT {
            let body: Value = res.json().await.unwrap();
            assert_eq!(body["error"], "duplicate_key");
        }
    }
}

#[tokio::test]
async fn unstorable_price_is_a_validation_error() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = signup_and_login(&server, &client, "clerk").await;

    let res = client
        .post(server.url("/items"))
        .bearer_auth(&token)
        .form(&[("name", "Yacht"), ("price", "100000000.00"), ("stock_quantity", "1")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    create_item(&server, &client, &token, "Yacht", "99999999.99", "1").await;
}

#[tokio::test]
async fn bill_totals_lifecycle_and_revenue() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = signup_and_login(&server, &client, "clerk").await;

    let customer = create_customer(&server, &client, &token, "Acme Ltd").await;
    let a = create_item(&server, &client, &token, "Alpha", "10.00", "50").await;
    let b = create_item(&server, &client, &token, "Beta", "5.50", "50").await;
    let c = create_item(&server, &client, &token, "Gamma", "3.00", "50").await;

    let res = client
        .post(server.url("/bills"))
        .bearer_auth(&token)
        .form(&[
            ("customer_id", customer["id"].as_str().unwrap()),
            ("item_ids", a["id"].as_str().unwrap()),
            ("quantities", "2"),
            ("item_ids", b["id"].as_str().unwrap()),
            ("quantities", "0"),
            ("item_ids", c["id"].as_str().unwrap()),
            ("quantities", "1"),
            ("tax_amount", "2.00"),
            ("discount_amount", "1.00"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let bill: Value = res.json().await.unwrap();
    let id = bill["id"].as_str().unwrap().to_string();

    assert_eq!(bill["bill_number"], "BILL-000001");
    assert_eq!(bill["status"], "DRAFT");
    assert_eq!(bill["items"].as_array().unwrap().len(), 2);
    assert_eq!(dec(&bill["total_amount"]), Decimal::new(2300, 2));
    assert_eq!(dec(&bill["final_amount"]), Decimal::new(2400, 2));

    // DRAFT cannot jump straight to PAID.
    let res = client
        .post(server.url(&format!("/bills/{id}/pay")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_transition");

    for step in ["confirm", "pay"] {
        let res = client
            .post(server.url(&format!("/bills/{id}/{step}")))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK, "{step}");
    }

    let res = client
        .get(server.url(&format!("/bills/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let paid: Value = res.json().await.unwrap();
    assert_eq!(paid["status"], "PAID");
    assert!(paid["paid_at"].is_string());

    let res = client
        .get(server.url("/bills/revenue"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(dec(&body["revenue"]), Decimal::new(2300, 2));

    let res = client
        .get(server.url("/bills?status=PAID&min_amount=20"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let page: Value = res.json().await.unwrap();
    assert_eq!(page["total_elements"], 1);

    let res = client
        .get(server.url("/home"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let home: Value = res.json().await.unwrap();
    assert_eq!(home["summary"]["paid_bills"], 1);
    assert_eq!(home["summary"]["total_customers"], 1);
}

#[tokio::test]
async fn bill_without_billable_lines_is_rejected() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = signup_and_login(&server, &client, "clerk").await;

    let customer = create_customer(&server, &client, &token, "Acme Ltd").await;
    let item = create_item(&server, &client, &token, "Alpha", "10.00", "5").await;

    let res = client
        .post(server.url("/bills"))
        .bearer_auth(&token)
        .form(&[
            ("customer_id", customer["id"].as_str().unwrap()),
            ("item_ids", item["id"].as_str().unwrap()),
            ("quantities", "0"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .get(server.url("/bills"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let page: Value = res.json().await.unwrap();
    assert_eq!(page["total_elements"], 0);
}
