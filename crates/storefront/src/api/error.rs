//! HTTP client error types.

use thiserror::Error;

/// Errors that can occur when talking to the backend API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The local request budget for this client is exhausted. No request was
    /// sent.
    #[error("Too many requests from client '{client_id}'")]
    RateLimited { client_id: String },

    /// The backend throttled the request.
    #[error("Throttled by backend, retry after {retry_after} seconds")]
    Throttled { retry_after: u64 },

    /// The backend rejected the request's credentials and no recovery was
    /// attempted (public route, already retried, or on the login page).
    #[error("Unauthorized")]
    Unauthorized,

    /// The session could not be refreshed; local session state was cleared.
    #[error("Session expired, please sign in again")]
    SessionExpired,

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// HTTP transport failed (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body did not match the expected shape.
    #[error("Failed to decode {context}: {source}")]
    Decode {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A request body could not be serialized.
    #[error("Failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),
}

impl ApiError {
    /// Authorization failures are recovered (or escalated) by the client
    /// itself; callers should not surface them again.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::SessionExpired)
    }

    /// Local or backend rate limiting.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Throttled { .. })
    }

    /// HTTP status associated with the error, when there is one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } | Self::Throttled { .. } => Some(429),
            Self::Unauthorized | Self::SessionExpired => Some(401),
            Self::NotFound(_) => Some(404),
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
