//! Integration tests for the HTTP client wrapper: local rate limiting and
//! single-flight session recovery.
//!
//! Run with: cargo test -p hardware-storefront-integration-tests

use std::num::NonZeroU32;
use std::time::Duration;

use hardware_storefront::api::ApiError;
use hardware_storefront::{ApiRequest, AuthStatus, Navigator};
use hardware_storefront_integration_tests::Harness;
use secrecy::ExposeSecret;

// ============================================================================
// Rate limiting
// ============================================================================

#[tokio::test]
async fn test_rate_limit_rejects_without_sending() {
    let harness = Harness::start_with(|config| {
        config.rate_limit.requests = NonZeroU32::new(3).expect("non-zero");
        config.rate_limit.window = Duration::from_secs(60);
    })
    .await;

    for _ in 0..3 {
        harness
            .api
            .send(ApiRequest::get("/categories"))
            .await
            .expect("Request within budget failed");
    }

    let err = harness
        .api
        .send(ApiRequest::get("/categories"))
        .await
        .expect_err("Fourth request should be rate limited");
    assert!(matches!(err, ApiError::RateLimited { ref client_id } if client_id == "storefront-web"));
    assert!(err.is_rate_limited());
    assert_eq!(harness.state().hits("GET /categories"), 3);
}

// ============================================================================
// 401 recovery
// ============================================================================

#[tokio::test]
async fn test_expired_token_is_refreshed_and_request_replayed() {
    let harness = Harness::start().await;
    harness.sign_in().await;
    let before = harness.session.access_token().expect("token after sign-in");

    harness.state().expire_access_token();
    let orders = harness
        .api
        .send(ApiRequest::get("/orders"))
        .await
        .expect("Request should succeed after refresh");

    assert!(orders.status().is_success());
    assert_eq!(harness.state().hits("POST /auth/refresh"), 1);
    assert_eq!(harness.state().hits("GET /orders"), 2);
    let after = harness.session.access_token().expect("token after refresh");
    assert_ne!(before.expose_secret(), after.expose_secret());
    assert!(!harness.api.refresh_in_flight());
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let harness = Harness::start().await;
    harness.sign_in().await;
    harness.state().set_refresh_delay(Duration::from_millis(100));
    harness.state().expire_access_token();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let api = harness.api.clone();
        handles.push(tokio::spawn(async move {
            api.send(ApiRequest::get("/orders")).await
        }));
    }
    for handle in handles {
        handle
            .await
            .expect("task panicked")
            .expect("Every caller should succeed after the shared refresh");
    }

    assert_eq!(harness.state().hits("POST /auth/refresh"), 1);
    // Every rejected request is replayed exactly once.
    let order_hits = harness.state().hits("GET /orders");
    assert!((9..=16).contains(&order_hits), "unexpected hit count {order_hits}");
    assert!(!harness.api.refresh_in_flight());
}

#[tokio::test]
async fn test_failed_refresh_clears_session_and_redirects_once() {
    let harness = Harness::start().await;
    harness.sign_in().await;
    harness.navigator.navigate("/account/orders");
    harness.state().set_refresh_allowed(false);
    harness.state().set_refresh_delay(Duration::from_millis(50));
    harness.state().expire_access_token();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let api = harness.api.clone();
        handles.push(tokio::spawn(async move {
            api.send(ApiRequest::get("/orders")).await
        }));
    }
    let mut expired = 0;
    for handle in handles {
        match handle.await.expect("task panicked") {
            Err(ApiError::SessionExpired) => expired += 1,
            // Sent after the reset, from the login page: not recovered.
            Err(ApiError::Unauthorized) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }
    assert!(expired >= 1);

    assert_eq!(harness.state().hits("POST /auth/refresh"), 1);
    assert_eq!(harness.session.status(), AuthStatus::Unauthenticated);
    assert!(!harness.session.has_tokens());
    assert_eq!(harness.navigator.resets(), vec!["/login".to_string()]);
    assert_eq!(harness.navigator.current_path(), "/login");
    assert!(!harness.api.refresh_in_flight());
}

#[tokio::test]
async fn test_public_route_401_is_not_recovered() {
    let harness = Harness::start().await;

    let err = harness
        .api
        .send(
            ApiRequest::post("/auth/login")
                .json(&serde_json::json!({ "email": "pat@hardware.example", "password": "nope" }))
                .expect("encodable body"),
        )
        .await
        .expect_err("Wrong password must fail");

    assert!(matches!(err, ApiError::Unauthorized));
    assert_eq!(harness.state().hits("POST /auth/refresh"), 0);
}

#[tokio::test]
async fn test_retried_request_is_not_recovered_again() {
    let harness = Harness::start().await;
    harness.sign_in().await;
    harness.state().expire_access_token();

    let err = harness
        .api
        .send(ApiRequest::get("/orders").retried())
        .await
        .expect_err("A replayed request must not be recovered");

    assert!(matches!(err, ApiError::Unauthorized));
    assert_eq!(harness.state().hits("POST /auth/refresh"), 0);
    assert_eq!(harness.state().hits("GET /orders"), 1);
}

#[tokio::test]
async fn test_no_recovery_on_login_page() {
    let harness = Harness::start().await;
    harness.sign_in().await;
    harness.navigator.navigate("/login");
    harness.state().expire_access_token();

    let err = harness
        .api
        .send(ApiRequest::get("/orders"))
        .await
        .expect_err("Requests from the login page are not recovered");

    assert!(matches!(err, ApiError::Unauthorized));
    assert_eq!(harness.state().hits("POST /auth/refresh"), 0);
    assert!(harness.navigator.resets().is_empty());
}

#[tokio::test]
async fn test_non_success_statuses_map_to_errors() {
    let harness = Harness::start().await;

    let err = harness
        .api
        .send(ApiRequest::get("/products/does-not-exist"))
        .await
        .expect_err("Unknown product");
    assert!(matches!(err, ApiError::NotFound(ref path) if path == "/products/does-not-exist"));
    assert_eq!(err.status(), Some(404));
}
