//! Positive item quantity.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityError {
    /// The value is zero or negative.
    #[error("quantity must be at least 1 (got {0})")]
    BelowMinimum(i64),
    /// The value does not fit the backend's quantity range.
    #[error("quantity must be at most {max} (got {value})")]
    TooLarge {
        /// The rejected value.
        value: i64,
        /// Largest accepted quantity.
        max: u32,
    },
}

/// A cart or order quantity. Always at least 1.
///
/// ```
/// use hardware_storefront_core::Quantity;
///
/// assert!(Quantity::new(1).is_ok());
/// assert!(Quantity::new(0).is_err());
/// assert!(Quantity::new(-3).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    /// A single unit.
    pub const ONE: Self = Self(1);

    /// Validate a raw quantity.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::BelowMinimum` for values below 1 and
    /// `QuantityError::TooLarge` for values beyond `u32::MAX`.
    pub fn new(value: i64) -> Result<Self, QuantityError> {
        if value < 1 {
            return Err(QuantityError::BelowMinimum(value));
        }
        u32::try_from(value)
            .map(Self)
            .map_err(|_| QuantityError::TooLarge {
                value,
                max: u32::MAX,
            })
    }

    /// The quantity as an unsigned integer.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::ONE
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
