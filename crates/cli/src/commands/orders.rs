//! Order and payment commands.

use hardware_storefront::error::StorefrontError;
use hardware_storefront::models::{NewOrder, Order};
use hardware_storefront::services::{Orders, Payments};
use hardware_storefront_core::{OrderId, PaymentId, PaymentMethod};

use super::Context;

/// List the customer's orders.
pub async fn list(ctx: &Context) -> Result<(), StorefrontError> {
    ctx.resolve_session().await;
    let orders = Orders::new(&ctx.api).orders().await?;
    if orders.is_empty() {
        println!("No orders yet");
    }
    for order in &orders {
        println!("{}", summary(order));
    }
    Ok(())
}

/// Show one order with its lines.
pub async fn show(ctx: &Context, order_id: &str) -> Result<(), StorefrontError> {
    ctx.resolve_session().await;
    let order = Orders::new(&ctx.api).order(&OrderId::new(order_id)).await?;

    println!("{}", summary(&order));
    println!("  ship to: {}", order.shipping_address);
    for item in &order.items {
        let name = item
            .product
            .as_ref()
            .map_or_else(|| item.product_id.to_string(), |p| p.name.clone());
        println!("  {:>4} x {:<40} {:>10}", item.quantity, name, item.price);
    }
    Ok(())
}

/// Place an order for the current cart.
pub async fn create(
    ctx: &Context,
    shipping_address: String,
    payment_method: PaymentMethod,
    notes: Option<String>,
) -> Result<(), StorefrontError> {
    ctx.resolve_session().await;
    let order = Orders::new(&ctx.api)
        .create_order(&NewOrder {
            shipping_address,
            payment_method,
            notes,
        })
        .await?;
    println!("Order placed: {}", summary(&order));
    Ok(())
}

/// Start paying for an order.
pub async fn start_payment(
    ctx: &Context,
    order_id: &str,
    method: PaymentMethod,
) -> Result<(), StorefrontError> {
    ctx.resolve_session().await;
    let session = Payments::new(&ctx.api)
        .initiate_payment(&OrderId::new(order_id), method)
        .await?;

    println!("Payment {} is {:?}", session.payment_id, session.status);
    if let Some(url) = &session.redirect_url {
        println!("Complete payment at: {url}");
    }
    Ok(())
}

/// Check a payment.
pub async fn payment_status(ctx: &Context, payment_id: &str) -> Result<(), StorefrontError> {
    ctx.resolve_session().await;
    let state = Payments::new(&ctx.api)
        .payment_status(&PaymentId::new(payment_id))
        .await?;
    println!(
        "Payment {} for order {}: {:?}, amount {}",
        state.id, state.order_id, state.status, state.amount
    );
    Ok(())
}

fn summary(order: &Order) -> String {
    format!(
        "{:<12} {}  {:?}/{:?}  total {}",
        order.id,
        order.created_at.format("%Y-%m-%d %H:%M"),
        order.status,
        order.payment_status,
        order.total_amount
    )
}
