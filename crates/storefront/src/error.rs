//! Unified error handling with Sentry integration.
//!
//! Each module owns its error enum; [`StorefrontError`] wraps all of them
//! for callers (such as the CLI) that want a single error type.

use thiserror::Error;

use crate::api::ApiError;
use crate::auth::AuthError;
use crate::cart::CartError;
use crate::config::ConfigError;
use crate::services::{OrderError, PaymentError};
use crate::storage::StorageError;

/// Any error the storefront library can return.
#[derive(Debug, Error)]
pub enum StorefrontError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Payment(#[from] PaymentError),
}

impl StorefrontError {
    /// Whether the error is worth reporting to Sentry. Input validation,
    /// sign-in problems and 4xx responses are the user's to fix.
    #[must_use]
    pub fn is_reportable(&self) -> bool {
        let api = match self {
            Self::Config(_) | Self::Storage(_) => return true,
            Self::Api(e) => e,
            Self::Auth(AuthError::Api(e))
            | Self::Cart(CartError::Api(e))
            | Self::Order(OrderError::Api(e))
            | Self::Payment(PaymentError::Api(e)) => e,
            _ => return false,
        };
        match api {
            ApiError::Api { status, .. } => *status >= 500,
            ApiError::Http(_) | ApiError::Decode { .. } | ApiError::Encode(_) => true,
            _ => false,
        }
    }

    /// Capture the error to Sentry if it is reportable.
    pub fn capture(&self) {
        if self.is_reportable() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Storefront error"
            );
        }
    }
}

/// Result type alias for `StorefrontError`.
pub type Result<T> = std::result::Result<T, StorefrontError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "p-123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
