//! Order placement and history.

use thiserror::Error;
use tracing::instrument;

use hardware_storefront_core::OrderId;

use crate::api::{ApiClient, ApiError, ApiRequest};
use crate::decode::OnePayload;
use crate::error::add_breadcrumb;
use crate::models::{NewOrder, Order};

/// Errors placing or reading orders.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Orders need somewhere to ship to. Nothing was sent.
    #[error("A shipping address is required")]
    MissingShippingAddress,

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Order endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Orders<'a> {
    api: &'a ApiClient,
}

impl<'a> Orders<'a> {
    #[must_use]
    pub const fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// Place an order for the current cart.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::MissingShippingAddress` for a blank address
    /// (nothing sent), `OrderError::Api` if the backend refuses.
    #[instrument(skip(self, order), fields(payment_method = %order.payment_method))]
    pub async fn create_order(&self, order: &NewOrder) -> Result<Order, OrderError> {
        let address = order.shipping_address.trim();
        if address.is_empty() {
            return Err(OrderError::MissingShippingAddress);
        }
        let body = NewOrder {
            shipping_address: address.to_string(),
            ..order.clone()
        };

        let created = self
            .api
            .send(ApiRequest::post("/orders").json(&body)?)
            .await?
            .json::<OnePayload<Order>>("order")?
            .into_inner();

        add_breadcrumb("order", "Placed order", Some(&[("order_id", created.id.as_str())]));
        tracing::info!(order_id = %created.id, total = %created.total_amount, "Order placed");
        Ok(created)
    }

    /// The signed-in customer's orders.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the body is not a list.
    #[instrument(skip(self))]
    pub async fn orders(&self) -> Result<Vec<Order>, ApiError> {
        self.api
            .send(ApiRequest::get("/orders"))
            .await?
            .json_list("orders")
    }

    /// One order.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if there is no such order.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn order(&self, id: &OrderId) -> Result<Order, ApiError> {
        let path = format!("/orders/{}", urlencoding::encode(id.as_str()));
        Ok(self
            .api
            .send(ApiRequest::get(path))
            .await?
            .json::<OnePayload<Order>>("order")?
            .into_inner())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use hardware_storefront_core::PaymentMethod;
    use url::Url;

    use super::*;
    use crate::api::HeadlessNavigator;
    use crate::config::StorefrontConfig;
    use crate::session::SessionStore;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn test_blank_address_is_rejected_locally() {
        let config = StorefrontConfig::new(Url::parse("http://127.0.0.1:9").unwrap());
        let session = Arc::new(SessionStore::restore(Arc::new(MemoryStore::new())));
        let api = ApiClient::new(&config, session, Arc::new(HeadlessNavigator::at("/"))).unwrap();

        let order = NewOrder {
            shipping_address: "   ".to_string(),
            payment_method: PaymentMethod::CashOnDelivery,
            notes: None,
        };
        assert!(matches!(
            Orders::new(&api).create_order(&order).await,
            Err(OrderError::MissingShippingAddress)
        ));
    }
}
