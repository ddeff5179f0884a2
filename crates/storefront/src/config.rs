//! Storefront client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_API_URL` - Base URL of the backend API (http or https)
//!
//! ## Optional
//! - `STOREFRONT_CLIENT_ID` - Rate limiter key for this client (default: storefront-web)
//! - `STOREFRONT_RATE_LIMIT_REQUESTS` - Requests allowed per window (default: 100)
//! - `STOREFRONT_RATE_LIMIT_WINDOW_SECS` - Rate limit window in seconds (default: 60)
//! - `STOREFRONT_REQUEST_TIMEOUT_SECS` - Per-request transport timeout (default: 15)
//! - `STOREFRONT_LOGIN_PATH` - Login entry point for forced redirects (default: /login)
//! - `STOREFRONT_CACHE_TTL_SECS` - Catalog cache time-to-live (default: 300)
//! - `STOREFRONT_CACHE_CAPACITY` - Catalog cache entry limit (default: 1000)
//! - `STOREFRONT_SESSION_FILE` - Where the CLI persists its session (default: .storefront-session.json)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::num::NonZeroU32;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_CLIENT_ID: &str = "storefront-web";
const DEFAULT_LOGIN_PATH: &str = "/login";
const DEFAULT_SESSION_FILE: &str = ".storefront-session.json";

/// Routes that never carry a session and are never retried after a 401.
const DEFAULT_PUBLIC_ROUTES: &[&str] = &[
    "/auth/login",
    "/auth/register",
    "/auth/refresh",
    "/products",
    "/categories",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Base URL of the backend API
    pub api_url: Url,
    /// Identifier the local rate limiter is keyed by
    pub client_id: String,
    /// Local request budget
    pub rate_limit: RateLimitConfig,
    /// Fixed transport timeout applied to every request
    pub request_timeout: Duration,
    /// Path of the login entry point
    pub login_path: String,
    /// Route prefixes that are reachable without a session
    pub public_routes: Vec<String>,
    /// Catalog cache settings
    pub cache: CacheConfig,
    /// Session persistence file (used by the CLI)
    pub session_file: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// N requests per rolling window, per client identifier.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Requests allowed within one window
    pub requests: NonZeroU32,
    /// Window length
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: NonZeroU32::new(100).unwrap_or(NonZeroU32::MIN),
            window: Duration::from_secs(60),
        }
    }
}

/// Catalog cache settings.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Time-to-live for cached catalog entries
    pub ttl: Duration,
    /// Maximum number of cached entries
    pub capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            capacity: 1000,
        }
    }
}

impl StorefrontConfig {
    /// Build a configuration for `api_url` with every optional setting at its
    /// default.
    #[must_use]
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            rate_limit: RateLimitConfig::default(),
            request_timeout: Duration::from_secs(15),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            public_routes: DEFAULT_PUBLIC_ROUTES
                .iter()
                .map(|route| (*route).to_string())
                .collect(),
            cache: CacheConfig::default(),
            session_file: PathBuf::from(DEFAULT_SESSION_FILE),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or any value
    /// fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let raw_url = get_required_env("STOREFRONT_API_URL")?;
        let api_url = parse_api_url("STOREFRONT_API_URL", &raw_url)?;
        let mut config = Self::new(api_url);

        if let Some(client_id) = get_optional_env("STOREFRONT_CLIENT_ID") {
            config.client_id = client_id;
        }
        let requests = get_non_zero::<u32>("STOREFRONT_RATE_LIMIT_REQUESTS", 100)?;
        config.rate_limit = RateLimitConfig {
            requests: NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN),
            window: Duration::from_secs(get_non_zero::<u64>(
                "STOREFRONT_RATE_LIMIT_WINDOW_SECS",
                60,
            )?),
        };
        config.request_timeout =
            Duration::from_secs(get_non_zero::<u64>("STOREFRONT_REQUEST_TIMEOUT_SECS", 15)?);
        if let Some(login_path) = get_optional_env("STOREFRONT_LOGIN_PATH") {
            config.login_path = login_path;
        }
        config.cache = CacheConfig {
            ttl: Duration::from_secs(get_non_zero::<u64>("STOREFRONT_CACHE_TTL_SECS", 300)?),
            capacity: get_non_zero("STOREFRONT_CACHE_CAPACITY", 1000)?,
        };
        if let Some(path) = get_optional_env("STOREFRONT_SESSION_FILE") {
            config.session_file = PathBuf::from(path);
        }
        config.sentry_dsn = get_optional_env("SENTRY_DSN");
        config.sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");

        Ok(config)
    }

    /// Whether `path` is reachable without a session.
    #[must_use]
    pub fn is_public_route(&self, path: &str) -> bool {
        self.public_routes
            .iter()
            .any(|route| path_matches(path, route))
    }

    /// Whether `path` is the login page or one of its sub-pages.
    #[must_use]
    pub fn is_login_path(&self, path: &str) -> bool {
        path_matches(path, &self.login_path)
    }
}

/// `path` is `route` itself or lies beneath it.
fn path_matches(path: &str, route: &str) -> bool {
    path.strip_prefix(route)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Parse an optional numeric variable that must not be zero.
fn get_non_zero<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default,
    T::Err: std::fmt::Display,
{
    let Some(raw) = get_optional_env(key) else {
        return Ok(default);
    };
    parse_non_zero(key, &raw)
}

fn parse_non_zero<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default,
    T::Err: std::fmt::Display,
{
    let value = raw
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if value == T::default() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(value)
}

/// Parse the backend URL, accepting only http and https.
fn parse_api_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}
