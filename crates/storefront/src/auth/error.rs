//! Authentication error types.

use hardware_storefront_core::EmailError;
use thiserror::Error;

use crate::api::ApiError;

/// Minimum password length accepted by registration and password changes.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Errors from sign-in, registration and profile management.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email address: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Wrong email/password, or the password field was empty.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Password must be at least {MIN_PASSWORD_LENGTH} characters")]
    WeakPassword,

    /// The request needs a signed-in user.
    #[error("Not signed in")]
    NotAuthenticated,

    /// Sign-in succeeded but neither cookies nor body carried a token.
    #[error("Sign-in response carried no session token")]
    MissingToken,

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Check password strength for new passwords.
pub(crate) fn validate_new_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword);
    }
    Ok(())
}
