//! Cart line items.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use hardware_storefront_core::{CartItemId, ProductId, Quantity, UserId};

use super::Product;

/// One line of the signed-in customer's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: CartItemId,
    #[serde(default = "unknown_user")]
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    /// Product attributes as of the last cart fetch.
    pub product: Product,
}

fn unknown_user() -> UserId {
    UserId::new("")
}

impl CartItem {
    /// Price of this line (unit price × quantity).
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.product.price * Decimal::from(self.quantity.get())
    }
}

/// Sum of line totals.
#[must_use]
pub fn total_amount(items: &[CartItem]) -> Decimal {
    items.iter().map(CartItem::line_total).sum()
}

/// Sum of quantities.
#[must_use]
pub fn total_items(items: &[CartItem]) -> u64 {
    items.iter().map(|item| u64::from(item.quantity.get())).sum()
}

/// Body of `POST /cart`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddToCartRequest<'a> {
    pub product_id: &'a ProductId,
    pub quantity: Quantity,
}

/// Body of `PUT /cart/{id}`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct UpdateQuantityRequest {
    pub quantity: Quantity,
}
