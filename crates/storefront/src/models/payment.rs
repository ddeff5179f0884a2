//! Payment sessions.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use hardware_storefront_core::{OrderId, PaymentId, PaymentMethod, PaymentStatus};

/// Result of starting a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSession {
    pub payment_id: PaymentId,
    #[serde(default)]
    pub status: PaymentStatus,
    /// Hosted payment page, when the method needs one.
    #[serde(default)]
    pub redirect_url: Option<String>,
}

/// Current state of a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentState {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub status: PaymentStatus,
    pub amount: Decimal,
}

/// Body of `POST /payments/initiate`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InitiatePaymentRequest<'a> {
    pub order_id: &'a OrderId,
    pub method: PaymentMethod,
}
