//! Command implementations.
//!
//! Every command runs against a [`Context`] built from the environment. The
//! session lives in `STOREFRONT_SESSION_FILE`, so sign-in survives between
//! invocations.

#![allow(clippy::print_stdout)]

pub mod account;
pub mod cart;
pub mod catalog;
pub mod orders;

use std::sync::Arc;

use hardware_storefront::error::StorefrontError;
use hardware_storefront::{
    ApiClient, AuthManager, AuthStatus, CartManager, CatalogCache, FileStore, HeadlessNavigator,
    SessionStore, StorefrontConfig,
};

/// Everything a command needs.
pub struct Context {
    pub api: ApiClient,
    pub auth: AuthManager,
    pub cart: CartManager,
    pub cache: CatalogCache,
}

impl Context {
    /// Restore the stored session and wire up the managers.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError::Storage` if the session file is unreadable,
    /// `StorefrontError::Api` if the HTTP client cannot be built.
    pub fn open(config: StorefrontConfig) -> Result<Self, StorefrontError> {
        let storage = Arc::new(FileStore::open(&config.session_file)?);
        tracing::debug!(path = %storage.path().display(), "Session file opened");

        let session = Arc::new(SessionStore::restore(storage));
        let navigator = Arc::new(HeadlessNavigator::at("/"));
        let api = ApiClient::new(&config, session, navigator)?;

        Ok(Self {
            auth: AuthManager::new(api.clone()),
            cart: CartManager::new(api.clone()),
            cache: CatalogCache::new(&config.cache),
            api,
        })
    }

    /// Resolve a restored session that has tokens but no cached user.
    pub async fn resolve_session(&self) -> AuthStatus {
        let status = self.auth.status();
        if status.is_resolved() {
            status
        } else {
            self.auth.check_session().await
        }
    }

    /// Stop background work before exit.
    pub fn shutdown(&self) {
        self.cart.unmount();
    }
}
