//! Customer authentication state manager.
//!
//! Drives the session through `Unauthenticated → Authenticating →
//! Authenticated` and back. The published [`AuthStatus`] lives in the
//! [`SessionStore`](crate::session::SessionStore); other components (the cart
//! manager in particular) subscribe to it.
//!
//! # Flows
//!
//! - **Startup**: [`AuthManager::check_session`] resolves a restored session
//!   against the profile endpoint.
//! - **Sign-in / registration**: credentials are validated locally, then
//!   exchanged for session tokens (cookies or body) and a user snapshot.
//! - **Sign-out**: best-effort backend call, local wipe, and a full
//!   navigation reset to the login page.

mod error;

pub use error::{AuthError, MIN_PASSWORD_LENGTH};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::instrument;

use hardware_storefront_core::Email;

use crate::api::{ApiClient, ApiError, ApiRequest, ApiResponse};
use crate::decode::OnePayload;
use crate::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::models::{ProfileUpdate, User};
use crate::session::{AuthStatus, SessionTokens};

use error::validate_new_password;

/// Email and password for sign-in.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

impl Credentials {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// New account details.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: SecretString,
    pub phone: Option<String>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a Email,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    name: &'a str,
    email: &'a Email,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest<'a> {
    current_password: &'a str,
    new_password: &'a str,
}

/// Body of a successful login or registration.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    user: User,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Authentication state manager.
#[derive(Debug, Clone)]
pub struct AuthManager {
    api: ApiClient,
}

impl AuthManager {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> AuthStatus {
        self.api.session().status()
    }

    /// Signed-in user, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.status().user().cloned()
    }

    /// Receive every future status change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.api.session().subscribe()
    }

    /// Resolve the initial authentication state.
    ///
    /// Without stored tokens this publishes `Unauthenticated` and makes no
    /// request. Otherwise the session is `Authenticating` until the profile
    /// endpoint answers. A rejected session is wiped; a transport failure
    /// leaves the tokens in place for the next check.
    #[instrument(skip(self))]
    pub async fn check_session(&self) -> AuthStatus {
        let session = self.api.session();
        if !session.has_tokens() {
            session.set_status(AuthStatus::Unauthenticated);
            return AuthStatus::Unauthenticated;
        }

        session.set_status(AuthStatus::Authenticating);
        match self.fetch_profile().await {
            Ok(user) => {
                set_sentry_user(&user.id, Some(user.email.as_str()));
                session.establish(user);
            }
            Err(e) if e.is_unauthorized() => {
                tracing::info!("Stored session rejected");
                session.clear();
            }
            Err(e) => {
                tracing::warn!(error = %e, "Session check failed, keeping stored tokens");
                session.set_status(AuthStatus::Unauthenticated);
            }
        }
        session.status()
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidEmail` / `AuthError::InvalidCredentials` for
    ///   input rejected locally (no request is sent)
    /// - `AuthError::InvalidCredentials` if the backend rejects the pair
    /// - `AuthError::Api` for other failures
    ///
    /// Any failure after the request is sent wipes cached session data.
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn login(&self, credentials: &Credentials) -> Result<User, AuthError> {
        let email = Email::parse(&credentials.email)?;
        let password = credentials.password.expose_secret();
        if password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }
        let request = ApiRequest::post("/auth/login").json(&LoginRequest {
            email: &email,
            password,
        })?;

        self.authenticate(request).await
    }

    /// Create an account and sign in to it.
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidEmail` / `AuthError::WeakPassword` for input
    ///   rejected locally (no request is sent)
    /// - `AuthError::Api` if the backend refuses the registration
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(&self, registration: &Registration) -> Result<User, AuthError> {
        let email = Email::parse(&registration.email)?;
        let password = registration.password.expose_secret();
        validate_new_password(password)?;
        let request = ApiRequest::post("/auth/register").json(&RegisterRequest {
            name: registration.name.trim(),
            email: &email,
            password,
            phone: registration.phone.as_deref(),
        })?;

        self.authenticate(request).await
    }

    /// Sign out.
    ///
    /// The backend is told best-effort; local session data is wiped
    /// regardless and navigation is reset to the login page, so no in-memory
    /// view state outlives the session.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        let session = self.api.session();
        if session.has_tokens() {
            // A 401 here must not start a refresh for a session being thrown away.
            let request = ApiRequest::post("/auth/logout").retried();
            if let Err(e) = self.api.send(request).await {
                tracing::debug!(error = %e, "Backend logout failed");
            }
        }

        session.clear();
        clear_sentry_user();
        add_breadcrumb("auth", "Signed out", None);
        tracing::info!("Signed out");

        self.api
            .navigator()
            .reset_to(&self.api.config().login_path);
    }

    /// Fetch the signed-in user's profile and refresh the cached snapshot.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotAuthenticated` without a request when there is
    /// no session, `AuthError::Api` otherwise.
    #[instrument(skip(self))]
    pub async fn profile(&self) -> Result<User, AuthError> {
        self.require_session()?;
        let user = self.fetch_profile().await?;
        self.api.session().establish(user.clone());
        Ok(user)
    }

    /// Update profile fields.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotAuthenticated` without a request when there is
    /// no session, `AuthError::Api` otherwise.
    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, AuthError> {
        self.require_session()?;
        if update.is_empty() {
            return self.profile().await;
        }

        let user: User = self
            .api
            .send(ApiRequest::put("/users/profile").json(update)?)
            .await?
            .json::<OnePayload<User>>("profile")?
            .into_inner();
        self.api.session().establish(user.clone());
        add_breadcrumb("auth", "Updated profile", None);
        Ok(user)
    }

    /// Change the account password.
    ///
    /// # Errors
    ///
    /// - `AuthError::WeakPassword` if `new` is too short (no request is sent)
    /// - `AuthError::InvalidCredentials` if `current` is rejected
    /// - `AuthError::Api` for other failures
    #[instrument(skip_all)]
    pub async fn change_password(
        &self,
        current: &SecretString,
        new: &SecretString,
    ) -> Result<(), AuthError> {
        self.require_session()?;
        validate_new_password(new.expose_secret())?;

        let request = ApiRequest::put("/users/password").json(&ChangePasswordRequest {
            current_password: current.expose_secret(),
            new_password: new.expose_secret(),
        })?;
        match self.api.send(request).await {
            Ok(_) => {
                tracing::info!("Password changed");
                Ok(())
            }
            Err(ApiError::Unauthorized) => Err(AuthError::InvalidCredentials),
            Err(ApiError::Api { status: 400, .. }) => Err(AuthError::InvalidCredentials),
            Err(e) => Err(e.into()),
        }
    }

    fn require_session(&self) -> Result<(), AuthError> {
        if self.api.session().has_tokens() {
            Ok(())
        } else {
            Err(AuthError::NotAuthenticated)
        }
    }

    async fn fetch_profile(&self) -> Result<User, ApiError> {
        Ok(self
            .api
            .send(ApiRequest::get("/auth/profile"))
            .await?
            .json::<OnePayload<User>>("profile")?
            .into_inner())
    }

    /// Exchange credentials for a session. Publishes `Authenticating` while
    /// the request runs, then `Authenticated` or `Unauthenticated`.
    async fn authenticate(&self, request: ApiRequest) -> Result<User, AuthError> {
        let session = self.api.session();
        session.set_status(AuthStatus::Authenticating);

        let result = match self.api.send(request).await {
            Ok(response) => self.start_session(&response),
            Err(ApiError::Unauthorized) => Err(AuthError::InvalidCredentials),
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(user) => {
                set_sentry_user(&user.id, Some(user.email.as_str()));
                add_breadcrumb("auth", "Signed in", Some(&[("user_id", user.id.as_str())]));
                tracing::info!(user_id = %user.id, "Signed in");
                session.establish(user.clone());
                Ok(user)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Sign-in failed");
                session.clear();
                Err(e)
            }
        }
    }

    /// Store tokens from the body (cookies were already applied by the
    /// client) and return the user.
    fn start_session(&self, response: &ApiResponse) -> Result<User, AuthError> {
        let body: AuthResponse = response.json("auth response")?;
        let session = self.api.session();

        if let Some(access) = body.access_token {
            let refresh = match body.refresh_token {
                Some(refresh) => Some(SecretString::from(refresh)),
                None => session.refresh_token(),
            };
            session.store_tokens(SessionTokens {
                access_token: SecretString::from(access),
                refresh_token: refresh,
            });
        }

        if session.has_tokens() {
            Ok(body.user)
        } else {
            Err(AuthError::MissingToken)
        }
    }
}
