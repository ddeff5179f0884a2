//! Integration tests for the authentication manager.
//!
//! Run with: cargo test -p hardware-storefront-integration-tests

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};

use hardware_storefront::models::ProfileUpdate;
use hardware_storefront::storage::keys;
use hardware_storefront::{
    ApiClient, AuthError, AuthManager, AuthStatus, Credentials, HeadlessNavigator, KeyValueStore,
    Navigator, Registration, SessionStore,
};
use hardware_storefront_integration_tests::{EMAIL, Harness, PASSWORD};

/// A second client sharing `harness`'s storage, as after a restart.
fn reopen(harness: &Harness) -> AuthManager {
    let session = Arc::new(SessionStore::restore(harness.storage.clone()));
    let api = ApiClient::new(
        &harness.backend.config(),
        session,
        Arc::new(HeadlessNavigator::at("/")),
    )
    .expect("Failed to build API client");
    AuthManager::new(api)
}

// ============================================================================
// Sign-in
// ============================================================================

#[tokio::test]
async fn test_login_authenticates_and_stores_tokens() {
    let harness = Harness::start().await;

    let user = harness
        .auth
        .login(&Credentials::new(EMAIL, PASSWORD))
        .await
        .expect("Login should succeed");

    assert_eq!(user.email.as_str(), EMAIL);
    assert_eq!(harness.auth.status(), AuthStatus::Authenticated(user.clone()));
    assert_eq!(harness.auth.current_user(), Some(user));
    assert!(harness.storage.get(keys::ACCESS_TOKEN).is_some());
    assert_eq!(harness.storage.get(keys::REFRESH_TOKEN).as_deref(), Some("refresh-1"));
    assert!(harness.storage.get(keys::USER).is_some());
}

#[tokio::test]
async fn test_wrong_password_is_invalid_credentials() {
    let harness = Harness::start().await;

    let err = harness
        .auth
        .login(&Credentials::new(EMAIL, "wrong-password"))
        .await
        .expect_err("Wrong password must fail");

    assert!(matches!(err, AuthError::InvalidCredentials));
    assert_eq!(harness.auth.status(), AuthStatus::Unauthenticated);
    assert!(!harness.session.has_tokens());
    assert_eq!(harness.state().hits("POST /auth/refresh"), 0);
}

#[tokio::test]
async fn test_malformed_email_sends_nothing() {
    let harness = Harness::start().await;

    let err = harness
        .auth
        .login(&Credentials::new("not-an-email", PASSWORD))
        .await
        .expect_err("Malformed email must fail");

    assert!(matches!(err, AuthError::InvalidEmail(_)));
    assert_eq!(harness.state().total_hits(), 0);
}

#[tokio::test]
async fn test_register_stores_body_tokens() {
    let harness = Harness::start().await;

    let user = harness
        .auth
        .register(&Registration {
            name: "  Sam Builder ".to_string(),
            email: "sam@hardware.example".to_string(),
            password: SecretString::from("long-enough-pw".to_string()),
            phone: None,
        })
        .await
        .expect("Registration should succeed");

    assert_eq!(user.email.as_str(), "sam@hardware.example");
    assert!(harness.auth.status().is_authenticated());
    let access = harness.session.access_token().expect("access token stored");
    assert!(access.expose_secret().starts_with("access-"));
    assert_eq!(harness.storage.get(keys::REFRESH_TOKEN).as_deref(), Some("refresh-1"));
}

#[tokio::test]
async fn test_register_rejects_short_password_locally() {
    let harness = Harness::start().await;

    let err = harness
        .auth
        .register(&Registration {
            name: "Sam".to_string(),
            email: "sam@hardware.example".to_string(),
            password: SecretString::from("short".to_string()),
            phone: None,
        })
        .await
        .expect_err("Short password must fail");

    assert!(matches!(err, AuthError::WeakPassword));
    assert_eq!(harness.state().total_hits(), 0);
}

// ============================================================================
// Session check
// ============================================================================

#[tokio::test]
async fn test_check_session_without_tokens_sends_nothing() {
    let harness = Harness::start().await;

    assert_eq!(harness.auth.check_session().await, AuthStatus::Unauthenticated);
    assert_eq!(harness.state().total_hits(), 0);
}

#[tokio::test]
async fn test_check_session_restores_stored_tokens() {
    let harness = Harness::start().await;
    harness.sign_in().await;
    // Tokens survive a restart; the cached user does not.
    harness.storage.remove(keys::USER);

    let auth = reopen(&harness);
    assert_eq!(auth.status(), AuthStatus::Authenticating);

    let status = auth.check_session().await;
    assert!(status.is_authenticated());
    assert_eq!(harness.state().hits("GET /auth/profile"), 1);
}

#[tokio::test]
async fn test_check_session_wipes_rejected_tokens() {
    let harness = Harness::start().await;
    harness.sign_in().await;
    harness.storage.remove(keys::USER);
    harness.state().expire_access_token();
    harness.state().set_refresh_allowed(false);

    let auth = reopen(&harness);
    assert_eq!(auth.check_session().await, AuthStatus::Unauthenticated);

    assert_eq!(harness.storage.get(keys::ACCESS_TOKEN), None);
    assert_eq!(harness.storage.get(keys::REFRESH_TOKEN), None);
}

// ============================================================================
// Sign-out
// ============================================================================

#[tokio::test]
async fn test_logout_wipes_session_and_resets_navigation() {
    let harness = Harness::start().await;
    harness.sign_in().await;
    harness.navigator.navigate("/account/orders");
    let mut status = harness.auth.subscribe();

    harness.auth.logout().await;

    assert_eq!(harness.state().hits("POST /auth/logout"), 1);
    assert_eq!(*status.borrow_and_update(), AuthStatus::Unauthenticated);
    assert!(!harness.session.has_tokens());
    for key in keys::SESSION_KEYS {
        assert_eq!(harness.storage.get(key), None, "{key} survived logout");
    }
    assert_eq!(harness.navigator.resets(), vec!["/login".to_string()]);
    assert_eq!(harness.navigator.current_path(), "/login");
}

#[tokio::test]
async fn test_logout_with_expired_session_does_not_refresh() {
    let harness = Harness::start().await;
    harness.sign_in().await;
    harness.state().expire_access_token();

    harness.auth.logout().await;

    assert_eq!(harness.state().hits("POST /auth/refresh"), 0);
    assert_eq!(harness.auth.status(), AuthStatus::Unauthenticated);
    assert_eq!(harness.navigator.current_path(), "/login");
}

// ============================================================================
// Profile
// ============================================================================

#[tokio::test]
async fn test_update_profile_refreshes_snapshot() {
    let harness = Harness::start().await;
    harness.sign_in().await;

    let user = harness
        .auth
        .update_profile(&ProfileUpdate {
            address: Some("12 Anvil Road".to_string()),
            ..ProfileUpdate::default()
        })
        .await
        .expect("Profile update should succeed");

    assert_eq!(user.address.as_deref(), Some("12 Anvil Road"));
    assert_eq!(harness.auth.current_user(), Some(user));
}

#[tokio::test]
async fn test_change_password_rejects_wrong_current() {
    let harness = Harness::start().await;
    harness.sign_in().await;

    let err = harness
        .auth
        .change_password(
            &SecretString::from("guess".to_string()),
            &SecretString::from("new-password-1".to_string()),
        )
        .await
        .expect_err("Wrong current password must fail");
    assert!(matches!(err, AuthError::InvalidCredentials));

    harness
        .auth
        .change_password(
            &SecretString::from(PASSWORD.to_string()),
            &SecretString::from("new-password-1".to_string()),
        )
        .await
        .expect("Correct current password");
    assert_eq!(harness.state().hits("PUT /users/password"), 2);
}

#[tokio::test]
async fn test_profile_requires_session() {
    let harness = Harness::start().await;

    let err = harness.auth.profile().await.expect_err("No session");
    assert!(matches!(err, AuthError::NotAuthenticated));
    assert_eq!(harness.state().total_hits(), 0);
}
