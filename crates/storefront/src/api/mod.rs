//! HTTP client for the storefront backend API.
//!
//! [`ApiClient`] is the single point of outbound request dispatch. Every call
//! goes through the same policies:
//!
//! 1. **Rate limit** - a keyed limiter is consulted first; an exhausted budget
//!    fails the call with [`ApiError::RateLimited`] without touching the
//!    network.
//! 2. **Credentials** - a [`SessionCookieJar`] is registered as the reqwest
//!    cookie provider. It sends the session's access token as a cookie, and
//!    `Set-Cookie` headers on responses update the session store.
//! 3. **Recovery** - a 401 on a protected, not-yet-retried request issued
//!    while the user is not on the login page joins the single-flight
//!    session refresh and replays the request once. A failed refresh clears
//!    the session and resets navigation to the login page.
//!
//! # Example
//!
//! ```rust,ignore
//! let session = Arc::new(SessionStore::restore(Arc::new(MemoryStore::new())));
//! let navigator = Arc::new(HeadlessNavigator::at("/"));
//! let api = ApiClient::new(&config, session, navigator)?;
//!
//! let categories: Vec<Category> = api
//!     .send(ApiRequest::get("/categories"))
//!     .await?
//!     .json_list("categories")?;
//! ```

pub mod cookies;
mod error;
pub mod navigator;
pub mod rate_limit;
pub mod refresh;

pub use error::ApiError;
pub use navigator::{HeadlessNavigator, Navigator};

use std::sync::Arc;

use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug, info_span, warn};
use url::Url;
use uuid::Uuid;

use crate::config::StorefrontConfig;
use crate::decode::ListPayload;
use crate::session::{SessionStore, SessionTokens};
use cookies::SessionCookieJar;
use rate_limit::ClientRateLimiter;
use refresh::{RefreshCoordinator, RefreshFailure};

/// Path of the session refresh endpoint.
pub const REFRESH_PATH: &str = "/auth/refresh";

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest body excerpt written to logs.
const LOG_BODY_LIMIT: usize = 500;

// =============================================================================
// Requests and responses
// =============================================================================

/// An outbound API call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    retried: bool,
}

impl ApiRequest {
    /// A request to `path`, relative to the API base URL.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            retried: false,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Encode` if `body` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ApiError> {
        self.body = Some(serde_json::to_value(body).map_err(ApiError::Encode)?);
        Ok(self)
    }

    /// Append query string pairs.
    #[must_use]
    pub fn query<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Mark the request as a replay so it is never recovered again.
    #[must_use]
    pub const fn retried(mut self) -> Self {
        self.retried = true;
        self
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub const fn is_retried(&self) -> bool {
        self.retried
    }
}

/// A successful (2xx) response with its body read.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    body: String,
}

impl ApiResponse {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Decode the body as `T`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Decode` labelled with `context` if the body does
    /// not match `T`.
    pub fn json<T: DeserializeOwned>(&self, context: &'static str) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|source| {
            tracing::error!(
                context,
                error = %source,
                body = %excerpt(&self.body),
                "Failed to decode API response"
            );
            ApiError::Decode { context, source }
        })
    }

    /// Decode a list that may arrive bare or wrapped in an envelope.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Decode` if the body is neither shape.
    pub fn json_list<T: DeserializeOwned>(
        &self,
        context: &'static str,
    ) -> Result<Vec<T>, ApiError> {
        self.json::<ListPayload<T>>(context)
            .map(ListPayload::into_items)
    }
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the storefront backend API.
///
/// Cheaply cloneable; clones share the session, rate limiter and refresh
/// coordinator.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    http: reqwest::Client,
    base_url: Url,
    config: StorefrontConfig,
    limiter: ClientRateLimiter,
    refresh: RefreshCoordinator,
    session: Arc<SessionStore>,
    navigator: Arc<dyn Navigator>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("client_id", &self.inner.config.client_id)
            .finish_non_exhaustive()
    }
}

/// Tokens a login or refresh may return in its body (in addition to, or
/// instead of, cookies).
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenBody {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Error body shapes the backend uses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ApiClient {
    /// Create a client for `config.api_url`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the HTTP client cannot be built.
    pub fn new(
        config: &StorefrontConfig,
        session: Arc<SessionStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let jar = SessionCookieJar::new(Arc::clone(&session), REFRESH_PATH);
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .cookie_provider(Arc::new(jar))
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                http,
                base_url: config.api_url.clone(),
                config: config.clone(),
                limiter: ClientRateLimiter::new(&config.rate_limit),
                refresh: RefreshCoordinator::new(),
                session,
                navigator,
            }),
        })
    }

    /// The session this client sends credentials from.
    #[must_use]
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.inner.session
    }

    /// The navigator used for forced redirects.
    #[must_use]
    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.inner.navigator
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Whether a session refresh call is currently running.
    #[must_use]
    pub fn refresh_in_flight(&self) -> bool {
        self.inner.refresh.in_flight()
    }

    /// Send a request through the rate limit and recovery policies.
    ///
    /// # Errors
    ///
    /// - `ApiError::RateLimited` if the local budget is exhausted (nothing sent)
    /// - `ApiError::Unauthorized` for a 401 that is not eligible for recovery,
    ///   or that persists after the replay
    /// - `ApiError::SessionExpired` if the session refresh failed
    /// - `ApiError::NotFound`, `ApiError::Throttled` or `ApiError::Api` for
    ///   other non-success statuses
    /// - `ApiError::Http` for transport failures
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let client_id = &self.inner.config.client_id;
        if !self.inner.limiter.try_acquire(client_id) {
            warn!(client_id = %client_id, path = %request.path, "Local rate limit exceeded");
            return Err(ApiError::RateLimited {
                client_id: client_id.clone(),
            });
        }

        let observed = self.inner.refresh.generation();
        let response = self.dispatch(&request).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return self.finish(&request, response).await;
        }

        if !self.is_recoverable(&request) {
            debug!(path = %request.path, retried = request.retried, "401 not eligible for recovery");
            return Err(ApiError::Unauthorized);
        }

        self.inner
            .refresh
            .refresh(observed, || self.refresh_session())
            .await
            .map_err(|_| ApiError::SessionExpired)?;

        let replay = request.retried();
        let response = self.dispatch(&replay).await?;
        self.finish(&replay, response).await
    }

    /// 401 recovery applies to protected, first-attempt requests made while
    /// the user is not already on the login page.
    fn is_recoverable(&self, request: &ApiRequest) -> bool {
        let config = &self.inner.config;
        !request.retried
            && !config.is_public_route(&request.path)
            && !config.is_login_path(&self.inner.navigator.current_path())
    }

    /// Build the absolute URL for `request`.
    fn url_for(&self, request: &ApiRequest) -> Url {
        let mut url = self.inner.base_url.clone();
        let base_path = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{base_path}/{}", request.path.trim_start_matches('/')));
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        url
    }

    /// Perform one HTTP exchange. The cookie provider attaches the session
    /// cookies and applies any `Set-Cookie` updates before this returns.
    async fn dispatch(&self, request: &ApiRequest) -> Result<reqwest::Response, ApiError> {
        let url = self.url_for(request);
        let request_id = Uuid::new_v4().to_string();
        let span = info_span!(
            "api_request",
            method = %request.method,
            path = %request.path,
            request_id = %request_id,
            retried = request.retried,
        );

        async {
            let mut builder = self
                .inner
                .http
                .request(request.method.clone(), url)
                .header(REQUEST_ID_HEADER, &request_id);

            if let Some(body) = &request.body {
                builder = builder
                    .header(CONTENT_TYPE, "application/json")
                    .body(body.to_string());
            }

            let response = builder.send().await?;
            debug!(status = %response.status(), "Response received");
            Ok(response)
        }
        .instrument(span)
        .await
    }

    /// Read the body and map non-success statuses to errors.
    async fn finish(
        &self,
        request: &ApiRequest,
        response: reqwest::Response,
    ) -> Result<ApiResponse, ApiError> {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::Throttled { retry_after });
        }

        let body = response.text().await?;

        if status.is_success() {
            return Ok(ApiResponse { status, body });
        }

        match status {
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
            StatusCode::NOT_FOUND => Err(ApiError::NotFound(request.path.clone())),
            _ => {
                tracing::error!(
                    status = %status,
                    path = %request.path,
                    body = %excerpt(&body),
                    "API returned non-success status"
                );
                Err(ApiError::Api {
                    status: status.as_u16(),
                    message: error_message(&body, status),
                })
            }
        }
    }

    /// The single-flight refresh body. Runs at most once per generation.
    ///
    /// On failure the session is destroyed here, once, and navigation is
    /// reset to the login page.
    async fn refresh_session(&self) -> Result<(), RefreshFailure> {
        let result = self.exchange_refresh_token().await;
        if let Err(failure) = &result {
            warn!(error = %failure, "Session refresh failed, signing out");
            self.inner.session.clear();
            self.inner
                .navigator
                .reset_to(&self.inner.config.login_path);
        }
        result
    }

    async fn exchange_refresh_token(&self) -> Result<(), RefreshFailure> {
        let session = &self.inner.session;
        let refresh_token = session.refresh_token();

        let mut request = ApiRequest::post(REFRESH_PATH);
        if let Some(token) = &refresh_token {
            request = request
                .json(&serde_json::json!({ "refreshToken": token.expose_secret() }))
                .map_err(|e| RefreshFailure(e.to_string()))?;
        }

        let response = self
            .dispatch(&request)
            .await
            .map_err(|e| RefreshFailure(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(RefreshFailure(format!("refresh endpoint returned {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RefreshFailure(e.to_string()))?;
        let tokens: TokenBody = serde_json::from_str(&body).unwrap_or_default();
        if let Some(access) = tokens.access_token {
            let refresh = tokens
                .refresh_token
                .map(SecretString::from)
                .or(refresh_token);
            session.store_tokens(SessionTokens {
                access_token: SecretString::from(access),
                refresh_token: refresh,
            });
        }

        if session.has_tokens() {
            tracing::info!("Session refreshed");
            Ok(())
        } else {
            Err(RefreshFailure("refresh returned no access token".to_string()))
        }
    }
}

/// Pull a human-readable message out of an error body.
fn error_message(body: &str, status: StatusCode) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message.or(b.error))
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        })
}

fn excerpt(body: &str) -> String {
    body.chars().take(LOG_BODY_LIMIT).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn client(api_url: &str, current_path: &str) -> ApiClient {
        let config = StorefrontConfig::new(Url::parse(api_url).unwrap());
        let session = Arc::new(SessionStore::restore(Arc::new(MemoryStore::new())));
        ApiClient::new(
            &config,
            session,
            Arc::new(HeadlessNavigator::at(current_path)),
        )
        .unwrap()
    }

    #[test]
    fn test_url_for_joins_base_path() {
        let api = client("https://api.hardware.example/v1/", "/");
        let request = ApiRequest::get("/products").query([("page", "2"), ("limit", "10")]);
        assert_eq!(
            api.url_for(&request).as_str(),
            "https://api.hardware.example/v1/products?page=2&limit=10"
        );
    }

    #[test]
    fn test_recoverable_requests() {
        let api = client("https://api.hardware.example", "/cart");
        assert!(api.is_recoverable(&ApiRequest::get("/cart")));
        assert!(!api.is_recoverable(&ApiRequest::get("/cart").retried()));
        assert!(!api.is_recoverable(&ApiRequest::post("/auth/login")));
        assert!(!api.is_recoverable(&ApiRequest::get("/products/p1")));

        let on_login = client("https://api.hardware.example", "/login");
        assert!(!on_login.is_recoverable(&ApiRequest::get("/cart")));
        let on_login_step = client("https://api.hardware.example", "/login/verify");
        assert!(!on_login_step.is_recoverable(&ApiRequest::get("/cart")));

        // Pages that merely share the prefix still recover.
        let on_help = client("https://api.hardware.example", "/login-help");
        assert!(on_help.is_recoverable(&ApiRequest::get("/cart")));
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(r#"{"message":"Out of stock"}"#, StatusCode::BAD_REQUEST),
            "Out of stock"
        );
        assert_eq!(
            error_message(r#"{"error":"Bad quantity"}"#, StatusCode::BAD_REQUEST),
            "Bad quantity"
        );
        assert_eq!(
            error_message("<html>", StatusCode::BAD_GATEWAY),
            "Bad Gateway"
        );
    }

    #[test]
    fn test_json_list_accepts_both_shapes() {
        let bare = ApiResponse {
            status: StatusCode::OK,
            body: "[1, 2]".to_string(),
        };
        let wrapped = ApiResponse {
            status: StatusCode::OK,
            body: r#"{"items": [3]}"#.to_string(),
        };
        assert_eq!(bare.json_list::<u32>("numbers").unwrap(), vec![1, 2]);
        assert_eq!(wrapped.json_list::<u32>("numbers").unwrap(), vec![3]);

        let wrong = ApiResponse {
            status: StatusCode::OK,
            body: r#"{"count": 3}"#.to_string(),
        };
        assert!(matches!(
            wrong.json_list::<u32>("numbers"),
            Err(ApiError::Decode {
                context: "numbers",
                ..
            })
        ));
    }
}
