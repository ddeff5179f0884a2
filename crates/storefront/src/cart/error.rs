//! Cart error types.

use hardware_storefront_core::QuantityError;
use thiserror::Error;

use crate::api::ApiError;

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Cart operations need a signed-in user. Nothing was sent.
    #[error("Please sign in to use the cart")]
    NotAuthenticated,

    /// The requested quantity is not a valid line quantity. Nothing was sent.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(#[from] QuantityError),

    /// More units requested than the product snapshot shows in stock.
    #[error("Only {available} in stock, {requested} requested")]
    ExceedsStock { requested: u32, available: i64 },

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl CartError {
    /// Authorization failures are handled by the HTTP client (refresh or
    /// sign-out) and are not shown to the user a second time.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        match self {
            Self::Api(e) => e.is_unauthorized(),
            _ => false,
        }
    }
}
