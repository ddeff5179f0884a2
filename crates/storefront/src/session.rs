//! Session state shared by the HTTP client and the auth manager.
//!
//! The session store owns the credential tokens, the cached user snapshot
//! and the published [`AuthStatus`]. Tokens sit behind a short-lived
//! `RwLock` that is never held across an `.await`, so the reqwest cookie
//! provider can read and update them synchronously. Status changes go out on
//! a `watch` channel; the cart manager listens to it to detect sign-in and
//! sign-out edges.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::watch;

use crate::api::cookies::{CookieUpdate, SessionCookies};
use crate::models::User;
use crate::storage::{KeyValueStore, keys};

/// Where authentication currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    /// No session.
    Unauthenticated,
    /// A login or session check is running. Not a decision: dependents must
    /// neither fetch nor clear on this state.
    Authenticating,
    /// Signed in as this user.
    Authenticated(User),
}

impl AuthStatus {
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// Whether the authentication check has reached a decision.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        !matches!(self, Self::Authenticating)
    }

    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

/// Access and refresh tokens.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
}

/// Credential store for one customer session.
pub struct SessionStore {
    tokens: RwLock<Option<SessionTokens>>,
    status: watch::Sender<AuthStatus>,
    storage: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("status", &*self.status.borrow())
            .field("tokens", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Restore a session from `storage`.
    ///
    /// Stored tokens plus a cached user start out `Authenticated`; tokens
    /// without a user start `Authenticating` until the auth manager checks
    /// them; no tokens means `Unauthenticated`.
    #[must_use]
    pub fn restore(storage: Arc<dyn KeyValueStore>) -> Self {
        let tokens = storage.get(keys::ACCESS_TOKEN).map(|access| SessionTokens {
            access_token: SecretString::from(access),
            refresh_token: storage.get(keys::REFRESH_TOKEN).map(SecretString::from),
        });
        let cached_user = storage
            .get(keys::USER)
            .and_then(|raw| serde_json::from_str::<User>(&raw).ok());

        let status = match (&tokens, cached_user) {
            (None, _) => AuthStatus::Unauthenticated,
            (Some(_), Some(user)) => AuthStatus::Authenticated(user),
            (Some(_), None) => AuthStatus::Authenticating,
        };
        tracing::debug!(?status, "Session restored");

        let (status, _) = watch::channel(status);
        Self {
            tokens: RwLock::new(tokens),
            status,
            storage,
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> AuthStatus {
        self.status.borrow().clone()
    }

    /// Receive every future status change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.status.subscribe()
    }

    /// Publish a new status. Receivers are only woken when it differs from
    /// the current one.
    pub(crate) fn set_status(&self, status: AuthStatus) {
        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    /// Backing key/value storage.
    #[must_use]
    pub fn storage(&self) -> &dyn KeyValueStore {
        self.storage.as_ref()
    }

    fn read_tokens(&self) -> RwLockReadGuard<'_, Option<SessionTokens>> {
        self.tokens.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_tokens(&self) -> RwLockWriteGuard<'_, Option<SessionTokens>> {
        self.tokens.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether an access token is held.
    #[must_use]
    pub fn has_tokens(&self) -> bool {
        self.read_tokens().is_some()
    }

    /// Current access token.
    #[must_use]
    pub fn access_token(&self) -> Option<SecretString> {
        self.read_tokens()
            .as_ref()
            .map(|tokens| tokens.access_token.clone())
    }

    /// Current refresh token.
    #[must_use]
    pub fn refresh_token(&self) -> Option<SecretString> {
        self.read_tokens()
            .as_ref()
            .and_then(|tokens| tokens.refresh_token.clone())
    }

    /// Replace the tokens and persist them.
    pub fn store_tokens(&self, tokens: SessionTokens) {
        let mut guard = self.write_tokens();
        self.storage
            .set(keys::ACCESS_TOKEN, tokens.access_token.expose_secret());
        match &tokens.refresh_token {
            Some(refresh) => self.storage.set(keys::REFRESH_TOKEN, refresh.expose_secret()),
            None => self.storage.remove(keys::REFRESH_TOKEN),
        }
        *guard = Some(tokens);
    }

    /// Apply token changes announced by `Set-Cookie` headers.
    ///
    /// A refresh cookie without an access token is remembered only when a
    /// session already exists.
    pub fn apply_cookies(&self, cookies: &SessionCookies) {
        if cookies.is_empty() {
            return;
        }
        let mut guard = self.write_tokens();

        match &cookies.access {
            Some(CookieUpdate::Set(access)) => {
                self.storage.set(keys::ACCESS_TOKEN, access);
                let refresh_token = guard.take().and_then(|tokens| tokens.refresh_token);
                *guard = Some(SessionTokens {
                    access_token: SecretString::from(access.clone()),
                    refresh_token,
                });
            }
            Some(CookieUpdate::Removed) => {
                self.storage.remove(keys::ACCESS_TOKEN);
                self.storage.remove(keys::REFRESH_TOKEN);
                *guard = None;
            }
            None => {}
        }

        if let Some(tokens) = guard.as_mut() {
            match &cookies.refresh {
                Some(CookieUpdate::Set(refresh)) => {
                    self.storage.set(keys::REFRESH_TOKEN, refresh);
                    tokens.refresh_token = Some(SecretString::from(refresh.clone()));
                }
                Some(CookieUpdate::Removed) => {
                    self.storage.remove(keys::REFRESH_TOKEN);
                    tokens.refresh_token = None;
                }
                None => {}
            }
        }
    }

    /// Record a signed-in user and publish `Authenticated`.
    pub fn establish(&self, user: User) {
        match serde_json::to_string(&user) {
            Ok(json) => self.storage.set(keys::USER, &json),
            Err(e) => tracing::warn!(error = %e, "Failed to cache user snapshot"),
        }
        self.set_status(AuthStatus::Authenticated(user));
    }

    /// Destroy the session: tokens, cached user and cart count are wiped and
    /// `Unauthenticated` is published.
    pub fn clear(&self) {
        let mut guard = self.write_tokens();
        *guard = None;
        for key in keys::SESSION_KEYS {
            self.storage.remove(key);
        }
        drop(guard);
        self.set_status(AuthStatus::Unauthenticated);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use hardware_storefront_core::{Email, UserId};

    fn user() -> User {
        User {
            id: UserId::new("u1"),
            email: Email::parse("pat@hardware.example").unwrap(),
            name: "Pat".to_string(),
            phone: None,
            address: None,
        }
    }

    #[test]
    fn test_restore_without_tokens_is_unauthenticated() {
        let store = SessionStore::restore(Arc::new(MemoryStore::new()));
        assert_eq!(store.status(), AuthStatus::Unauthenticated);
        assert!(!store.has_tokens());
    }

    #[test]
    fn test_restore_tokens_without_user_is_unresolved() {
        let storage = Arc::new(MemoryStore::new());
        storage.set(keys::ACCESS_TOKEN, "a");
        let store = SessionStore::restore(storage);
        assert_eq!(store.status(), AuthStatus::Authenticating);
        assert!(!store.status().is_resolved());
    }

    #[test]
    fn test_restore_with_cached_user() {
        let storage = Arc::new(MemoryStore::new());
        storage.set(keys::ACCESS_TOKEN, "a");
        storage.set(keys::USER, &serde_json::to_string(&user()).unwrap());
        let store = SessionStore::restore(storage);
        assert_eq!(store.status(), AuthStatus::Authenticated(user()));
    }

    #[test]
    fn test_apply_cookies_rotates_tokens() {
        let storage = Arc::new(MemoryStore::new());
        let store = SessionStore::restore(storage.clone());

        store
            .apply_cookies(&SessionCookies {
                access: Some(CookieUpdate::Set("a1".to_string())),
                refresh: Some(CookieUpdate::Set("r1".to_string())),
            })
            ;
        assert_eq!(store.access_token().unwrap().expose_secret(), "a1");
        assert_eq!(store.refresh_token().unwrap().expose_secret(), "r1");

        store
            .apply_cookies(&SessionCookies {
                access: Some(CookieUpdate::Set("a2".to_string())),
                refresh: None,
            })
            ;
        assert_eq!(store.access_token().unwrap().expose_secret(), "a2");
        assert_eq!(store.refresh_token().unwrap().expose_secret(), "r1");
        assert_eq!(storage.get(keys::ACCESS_TOKEN).as_deref(), Some("a2"));
    }

    #[test]
    fn test_clear_wipes_everything() {
        let storage = Arc::new(MemoryStore::new());
        let store = SessionStore::restore(storage.clone());
        store
            .store_tokens(SessionTokens {
                access_token: SecretString::from("a"),
                refresh_token: Some(SecretString::from("r")),
            })
            ;
        store.establish(user());
        storage.set(keys::CART_COUNT, "2");

        let mut rx = store.subscribe();
        store.clear();

        assert!(!store.has_tokens());
        assert_eq!(store.status(), AuthStatus::Unauthenticated);
        assert!(rx.has_changed().unwrap());
        for key in keys::SESSION_KEYS {
            assert_eq!(storage.get(key), None);
        }
    }
}
