//! Payment sessions for placed orders.

use thiserror::Error;
use tracing::instrument;

use hardware_storefront_core::{OrderId, PaymentId, PaymentMethod};

use crate::api::{ApiClient, ApiError, ApiRequest};
use crate::decode::OnePayload;
use crate::models::payment::InitiatePaymentRequest;
use crate::models::{PaymentSession, PaymentState};

/// Errors starting or checking a payment.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Card payments hand off to a hosted page; a session without one
    /// cannot be completed.
    #[error("Payment {0} has no redirect URL")]
    MissingRedirect(PaymentId),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Payment endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Payments<'a> {
    api: &'a ApiClient,
}

impl<'a> Payments<'a> {
    #[must_use]
    pub const fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// Start paying for an order.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::MissingRedirect` when a card session comes back
    /// without a hosted payment page, `PaymentError::Api` otherwise.
    #[instrument(skip(self), fields(order_id = %order_id, method = %method))]
    pub async fn initiate_payment(
        &self,
        order_id: &OrderId,
        method: PaymentMethod,
    ) -> Result<PaymentSession, PaymentError> {
        let request = ApiRequest::post("/payments/initiate")
            .json(&InitiatePaymentRequest { order_id, method })?;
        let session = self
            .api
            .send(request)
            .await?
            .json::<OnePayload<PaymentSession>>("payment session")?
            .into_inner();

        if method == PaymentMethod::Card && session.redirect_url.is_none() {
            return Err(PaymentError::MissingRedirect(session.payment_id));
        }
        tracing::info!(payment_id = %session.payment_id, "Payment started");
        Ok(session)
    }

    /// Current state of a payment.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if there is no such payment.
    #[instrument(skip(self), fields(payment_id = %payment_id))]
    pub async fn payment_status(&self, payment_id: &PaymentId) -> Result<PaymentState, ApiError> {
        let path = format!(
            "/payments/{}/status",
            urlencoding::encode(payment_id.as_str())
        );
        Ok(self
            .api
            .send(ApiRequest::get(path))
            .await?
            .json::<OnePayload<PaymentState>>("payment status")?
            .into_inner())
    }
}
