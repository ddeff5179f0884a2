//! Type-safe price representation using decimal arithmetic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::Quantity;

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    #[serde(default)]
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Price of `quantity` units at this unit price.
    #[must_use]
    pub fn line_total(&self, quantity: Quantity) -> Self {
        Self {
            amount: self.amount * Decimal::from(quantity.get()),
            currency_code: self.currency_code,
        }
    }

    /// Format for display (e.g., "$19.99").
    #[must_use]
    pub fn display(&self) -> String {
        format!("{}{:.2}", self.currency_code.symbol(), self.amount)
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
}

impl CurrencyCode {
    /// Currency symbol used when formatting prices.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::USD | Self::CAD | Self::AUD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_line_total() {
        let price = Price::new(Decimal::new(1999, 2), CurrencyCode::USD);
        let total = price.line_total(Quantity::new(3).unwrap());
        assert_eq!(total.amount, Decimal::new(5997, 2));
        assert_eq!(total.display(), "$59.97");
    }

    #[test]
    fn test_currency_defaults_to_usd() {
        let price: Price = serde_json::from_str(r#"{"amount":"12.50"}"#).unwrap();
        assert_eq!(price.currency_code, CurrencyCode::USD);
        assert_eq!(price.display(), "$12.50");
    }
}
