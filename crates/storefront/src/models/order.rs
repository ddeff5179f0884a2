//! Orders.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use hardware_storefront_core::{
    OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, Quantity,
};

use super::Product;

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    #[serde(default)]
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
}

/// One line of an order, priced at checkout time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub price: Decimal,
    #[serde(default)]
    pub product: Option<Product>,
}

/// Checkout request: turns the current cart into an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub shipping_address: String,
    pub payment_method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}
