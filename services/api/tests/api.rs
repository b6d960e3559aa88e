//! services/api/tests/api.rs
//!
//! Integration tests driving the full router against the in-memory mock
//! store, pinning the externally observable contract: slug derivation,
//! checkout validation, the trusted client total, webhook signature
//! handling, review aggregation and vote idempotency.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, Response, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use api_lib::adapters::{MemStore, TracingNotifier};
use api_lib::config::Config;
use api_lib::web::{build_router, session, webhook, AppState};
use storefront_core::domain::{NotificationPreferences, OrderStatus, Role};
use storefront_core::ports::{NewUser, StorefrontStore};

const SESSION_SECRET: &str = "test-session-secret";
const WEBHOOK_SECRET: &str = "whsec_test";

struct TestApp {
    router: Router,
    store: Arc<MemStore>,
    admin_cookie: String,
    customer_cookie: String,
    customer_id: Uuid,
}

async fn spawn_app() -> TestApp {
    let store = Arc::new(MemStore::new());

    let admin = store
        .create_user(NewUser {
            name: "Admin".to_string(),
            email: "admin@example.com".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            role: Role::Admin,
            preferences: NotificationPreferences::default(),
        })
        .await
        .expect("admin seeds");
    let customer = store
        .create_user(NewUser {
            name: "Customer".to_string(),
            email: "customer@example.com".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            role: Role::Customer,
            preferences: NotificationPreferences::default(),
        })
        .await
        .expect("customer seeds");

    let config = Config {
        bind_address: "127.0.0.1:0".parse().expect("socket addr parses"),
        database_url: None,
        log_level: tracing::Level::INFO,
        session_secret: SESSION_SECRET.to_string(),
        payment_webhook_secret: WEBHOOK_SECRET.to_string(),
        upload_dir: std::env::temp_dir().join("storefront-test-uploads"),
        cors_origin: "http://localhost:3000".to_string(),
        admin_email: None,
        admin_password: None,
    };

    let dyn_store: Arc<dyn StorefrontStore> = store.clone();
    let state = Arc::new(AppState {
        store: dyn_store,
        notifier: Arc::new(TracingNotifier::new()),
        config: Arc::new(config),
    });

    let admin_token = session::issue(SESSION_SECRET, admin.id, Role::Admin);
    let customer_token = session::issue(SESSION_SECRET, customer.id, Role::Customer);

    TestApp {
        router: build_router(state),
        store,
        admin_cookie: format!("session={}", admin_token),
        customer_cookie: format!("session={}", customer_token),
        customer_id: customer.id,
    }
}

fn json_request(method: Method, uri: &str, cookie: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).expect("request builds")
}

async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    serde_json::from_slice(&bytes).expect("body is JSON")
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    String::from_utf8(bytes.to_vec()).expect("body is UTF-8")
}

fn shipping_address() -> Value {
    json!({
        "name": "Jo Carter",
        "street": "1 Main St",
        "city": "Springfield",
        "state": "IL",
        "zip_code": "62701",
        "country": "US"
    })
}

async fn create_test_cap(app: &TestApp) -> Value {
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/products",
            Some(&app.admin_cookie),
            &json!({
                "title": "Test Cap",
                "price": 10.0,
                "images": ["a.jpg"],
                "description": "d"
            }),
        ))
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

#[tokio::test]
async fn creating_a_product_derives_the_slug() {
    let app = spawn_app().await;
    let product = create_test_cap(&app).await;
    assert_eq!(product["slug"], "test-cap");
    assert_eq!(product["price"], 10.0);
    assert_eq!(product["currency"], "USD");
}

#[tokio::test]
async fn duplicate_slugs_are_rejected() {
    let app = spawn_app().await;
    create_test_cap(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/products",
            Some(&app.admin_cookie),
            &json!({
                "title": "Test Cap",
                "price": 12.0,
                "images": ["b.jpg"],
                "description": "again"
            }),
        ))
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_text(response).await,
        "Product with this slug already exists"
    );
}

#[tokio::test]
async fn non_admins_cannot_create_products() {
    let app = spawn_app().await;
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/products",
            Some(&app.customer_cookie),
            &json!({
                "title": "Test Cap",
                "price": 10.0,
                "images": ["a.jpg"],
                "description": "d"
            }),
        ))
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn product_lookup_resolves_id_and_slug() {
    let app = spawn_app().await;
    let product = create_test_cap(&app).await;

    let by_slug = app
        .router
        .clone()
        .oneshot(get_request("/products/test-cap", None))
        .await
        .expect("request completes");
    assert_eq!(by_slug.status(), StatusCode::OK);

    let id = product["id"].as_str().expect("id is a string");
    let by_id = app
        .router
        .clone()
        .oneshot(get_request(&format!("/products/{}", id), None))
        .await
        .expect("request completes");
    assert_eq!(by_id.status(), StatusCode::OK);

    let missing = app
        .router
        .clone()
        .oneshot(get_request("/products/does-not-exist", None))
        .await
        .expect("request completes");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn inverted_price_bounds_return_an_empty_list() {
    let app = spawn_app().await;
    create_test_cap(&app).await;

    // Old storefront clients send camelCase bounds; both spellings work.
    let response = app
        .router
        .clone()
        .oneshot(get_request("/products?minPrice=1000&maxPrice=1", None))
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["products"], json!([]));
    assert_eq!(body["pagination"]["total_count"], 0);
}

#[tokio::test]
async fn orders_require_a_session() {
    let app = spawn_app().await;
    let response = app
        .router
        .clone()
        .oneshot(json_request(Method::POST, "/orders", None, &json!({})))
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn order_with_empty_items_is_rejected() {
    let app = spawn_app().await;
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/orders",
            Some(&app.customer_cookie),
            &json!({
                "items": [],
                "total": 10.0,
                "shipping_address": shipping_address()
            }),
        ))
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "Items are required");
}

#[tokio::test]
async fn order_total_is_trusted_as_given() {
    let app = spawn_app().await;
    let product = create_test_cap(&app).await;
    let product_id = product["id"].as_str().expect("id is a string");

    // Line items sum to 20.0, the declared total says 999.0. Current
    // behavior: the declared total is stored untouched.
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/orders",
            Some(&app.customer_cookie),
            &json!({
                "items": [
                    {"product_id": product_id, "quantity": 2, "price": 10.0}
                ],
                "total": 999.0,
                "shipping_address": shipping_address(),
                "payment_intent_id": "pi_trusted"
            }),
        ))
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::OK);
    let order = body_json(response).await;
    assert_eq!(order["total"], 999.0);
    assert_eq!(order["status"], "pending");
}

#[tokio::test]
async fn webhook_with_invalid_signature_is_rejected_without_mutation() {
    let app = spawn_app().await;
    let product = create_test_cap(&app).await;
    let product_id = product["id"].as_str().expect("id is a string");

    let order = {
        let response = app
            .router
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/orders",
                Some(&app.customer_cookie),
                &json!({
                    "items": [{"product_id": product_id, "quantity": 1, "price": 10.0}],
                    "total": 10.0,
                    "shipping_address": shipping_address(),
                    "payment_intent_id": "pi_sig_test"
                }),
            ))
            .await
            .expect("request completes");
        body_json(response).await
    };
    let order_id: Uuid = order["id"]
        .as_str()
        .expect("id is a string")
        .parse()
        .expect("id parses");

    let payload = json!({
        "type": "payment_intent.succeeded",
        "data": {"object": {"id": "pi_sig_test"}}
    });
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/webhooks/payment")
                .header(header::CONTENT_TYPE, "application/json")
                .header(webhook::SIGNATURE_HEADER, "t=1700000000,v1=deadbeef")
                .body(Body::from(payload.to_string()))
                .expect("request builds"),
        )
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // No order mutation happened.
    let stored = app.store.get_order(order_id).await.expect("order exists");
    assert_eq!(stored.status, OrderStatus::Pending);
    assert!(stored.paid_at.is_none());
}

#[tokio::test]
async fn webhook_with_valid_signature_marks_the_order_paid() {
    let app = spawn_app().await;
    let product = create_test_cap(&app).await;
    let product_id = product["id"].as_str().expect("id is a string");

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/orders",
            Some(&app.customer_cookie),
            &json!({
                "items": [{"product_id": product_id, "quantity": 1, "price": 10.0}],
                "total": 10.0,
                "shipping_address": shipping_address(),
                "payment_intent_id": "pi_ok"
            }),
        ))
        .await
        .expect("request completes");
    let order = body_json(response).await;
    let order_id: Uuid = order["id"]
        .as_str()
        .expect("id is a string")
        .parse()
        .expect("id parses");

    let payload = json!({
        "type": "payment_intent.succeeded",
        "data": {"object": {"id": "pi_ok"}}
    })
    .to_string();
    let signature = webhook::sign_payload(WEBHOOK_SECRET, 1_700_000_000, payload.as_bytes());

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/webhooks/payment")
                .header(header::CONTENT_TYPE, "application/json")
                .header(webhook::SIGNATURE_HEADER, &signature)
                .body(Body::from(payload.clone()))
                .expect("request builds"),
        )
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"received": true}));

    let stored = app.store.get_order(order_id).await.expect("order exists");
    assert_eq!(stored.status, OrderStatus::Paid);
    assert!(stored.paid_at.is_some());

    // A success with no matching order is acknowledged and dropped.
    let orphan = json!({
        "type": "payment_intent.succeeded",
        "data": {"object": {"id": "pi_unknown"}}
    })
    .to_string();
    let orphan_sig = webhook::sign_payload(WEBHOOK_SECRET, 1_700_000_001, orphan.as_bytes());
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/webhooks/payment")
                .header(header::CONTENT_TYPE, "application/json")
                .header(webhook::SIGNATURE_HEADER, &orphan_sig)
                .body(Body::from(orphan))
                .expect("request builds"),
        )
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn helpful_vote_is_idempotent_per_user() {
    let app = spawn_app().await;
    let product = create_test_cap(&app).await;
    let product_id = product["id"].as_str().expect("id is a string");

    // Another user submits the review being voted on.
    let reviewer = app
        .store
        .create_user(NewUser {
            name: "Reviewer".to_string(),
            email: "reviewer@example.com".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            role: Role::Customer,
            preferences: NotificationPreferences::default(),
        })
        .await
        .expect("reviewer seeds");
    let review = app
        .store
        .create_review(storefront_core::ports::NewReview {
            product_id: product_id.parse().expect("id parses"),
            user_id: reviewer.id,
            rating: 5,
            title: "Great".to_string(),
            content: "Would buy again".to_string(),
            images: vec![],
            purchase_verified: false,
        })
        .await
        .expect("review seeds");

    for _ in 0..2 {
        let response = app
            .router
            .clone()
            .oneshot(json_request(
                Method::POST,
                &format!("/reviews/{}/helpful", review.id),
                Some(&app.customer_cookie),
                &json!({"helpful": true}),
            ))
            .await
            .expect("request completes");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        // Voting twice leaves the voter present exactly once.
        assert_eq!(body["helpful_count"], 1);
        assert_eq!(body["not_helpful_count"], 0);
        assert_eq!(body["helpfulness_score"], 100.0);
    }

    let stored = app.store.get_review(review.id).await.expect("review exists");
    assert_eq!(stored.helpful, vec![app.customer_id]);
}

#[tokio::test]
async fn pending_reviews_do_not_affect_the_displayed_average() {
    let app = spawn_app().await;
    let product = create_test_cap(&app).await;
    let product_id: Uuid = product["id"]
        .as_str()
        .expect("id is a string")
        .parse()
        .expect("id parses");

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/reviews",
            Some(&app.customer_cookie),
            &json!({
                "product_id": product_id,
                "rating": 4,
                "title": "Solid",
                "content": "Holds up well."
            }),
        ))
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["review"]["status"], "pending");
    let review_id = body["review"]["id"].as_str().expect("id is a string");

    // Submission counts in the distribution but not the average.
    let stored = app.store.get_product(product_id).await.expect("product exists");
    assert_eq!(stored.review_stats.total, 1);
    assert_eq!(stored.review_stats.distribution[3], 1);
    assert_eq!(stored.review_stats.average, 0.0);

    // The public listing hides it too.
    let listing = app
        .router
        .clone()
        .oneshot(get_request(
            &format!("/reviews?product_id={}", product_id),
            None,
        ))
        .await
        .expect("request completes");
    let listing = body_json(listing).await;
    assert_eq!(listing["reviews"], json!([]));

    // Approval moves the average.
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            Method::PATCH,
            &format!("/reviews/{}/status", review_id),
            Some(&app.admin_cookie),
            &json!({"status": "approved"}),
        ))
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::OK);

    let stored = app.store.get_product(product_id).await.expect("product exists");
    assert_eq!(stored.review_stats.average, 4.0);
}

#[tokio::test]
async fn duplicate_reviews_are_rejected() {
    let app = spawn_app().await;
    let product = create_test_cap(&app).await;
    let product_id = product["id"].as_str().expect("id is a string");

    let review = json!({
        "product_id": product_id,
        "rating": 4,
        "title": "Solid",
        "content": "Holds up well."
    });
    let first = app
        .router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/reviews",
            Some(&app.customer_cookie),
            &review,
        ))
        .await
        .expect("request completes");
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/reviews",
            Some(&app.customer_cookie),
            &review,
        ))
        .await
        .expect("request completes");
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_text(second).await,
        "You have already reviewed this product"
    );
}

#[tokio::test]
async fn wishlist_toggle_round_trips() {
    let app = spawn_app().await;
    let product = create_test_cap(&app).await;
    let product_id = product["id"].as_str().expect("id is a string");

    let added = app
        .router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/wishlist",
            Some(&app.customer_cookie),
            &json!({"product_id": product_id}),
        ))
        .await
        .expect("request completes");
    assert_eq!(added.status(), StatusCode::OK);
    let added = body_json(added).await;
    assert_eq!(added["message"], "Product added to wishlist");

    let listing = app
        .router
        .clone()
        .oneshot(get_request("/wishlist", Some(&app.customer_cookie)))
        .await
        .expect("request completes");
    let listing = body_json(listing).await;
    assert_eq!(listing["wishlist"][0]["slug"], "test-cap");

    let removed = app
        .router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/wishlist",
            Some(&app.customer_cookie),
            &json!({"product_id": product_id}),
        ))
        .await
        .expect("request completes");
    let removed = body_json(removed).await;
    assert_eq!(removed["message"], "Product removed from wishlist");
    assert_eq!(removed["wishlist"], json!([]));
}

#[tokio::test]
async fn signup_then_login_round_trips() {
    let app = spawn_app().await;

    let signup = app
        .router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/auth/signup",
            None,
            &json!({
                "name": "New User",
                "email": "New.User@Example.com",
                "password": "hunter2hunter2"
            }),
        ))
        .await
        .expect("request completes");
    assert_eq!(signup.status(), StatusCode::CREATED);
    let cookie = signup
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("session cookie set")
        .to_string();
    assert!(cookie.starts_with("session="));

    // Email is stored lowercased; login is case-insensitive on it.
    let login = app
        .router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/auth/login",
            None,
            &json!({"email": "new.user@example.com", "password": "hunter2hunter2"}),
        ))
        .await
        .expect("request completes");
    assert_eq!(login.status(), StatusCode::OK);
    let body = body_json(login).await;
    assert_eq!(body["role"], "customer");

    let bad_login = app
        .router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/auth/login",
            None,
            &json!({"email": "new.user@example.com", "password": "wrong"}),
        ))
        .await
        .expect("request completes");
    assert_eq!(bad_login.status(), StatusCode::UNAUTHORIZED);
}
