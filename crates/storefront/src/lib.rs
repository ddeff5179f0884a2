//! Hardware Storefront client library.
//!
//! Customer-side client for the hardware store backend API. Everything a
//! storefront front end needs besides rendering:
//!
//! - [`api`] - HTTP client with per-client rate limiting and single-flight
//!   session refresh on 401
//! - [`session`] - tokens, cached user and the published auth status
//! - [`auth`] - sign-in, registration, sign-out and profile
//! - [`cart`] - cart state kept in step with the backend and the auth status
//! - [`services`] - catalog, orders and payments
//! - [`cache`] - TTL cache for catalog responses
//!
//! # Wiring
//!
//! ```rust,ignore
//! let config = StorefrontConfig::from_env()?;
//! let storage = Arc::new(FileStore::open(&config.session_file)?);
//! let session = Arc::new(SessionStore::restore(storage));
//! let api = ApiClient::new(&config, session, Arc::new(HeadlessNavigator::at("/")))?;
//!
//! let auth = AuthManager::new(api.clone());
//! let cart = CartManager::new(api.clone());
//! let _watcher = cart.watch_auth();
//! auth.check_session().await;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod auth;
pub mod cache;
pub mod cart;
pub mod config;
pub mod decode;
pub mod error;
pub mod models;
pub mod services;
pub mod session;
pub mod storage;

pub use api::{ApiClient, ApiError, ApiRequest, HeadlessNavigator, Navigator};
pub use auth::{AuthError, AuthManager, Credentials, Registration};
pub use cache::CatalogCache;
pub use cart::{CartError, CartManager, CartState, FetchOutcome};
pub use config::StorefrontConfig;
pub use error::StorefrontError;
pub use session::{AuthStatus, SessionStore};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
