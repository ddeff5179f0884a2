//! Cart commands.

use hardware_storefront::cart::{CartError, FetchOutcome};
use hardware_storefront::error::StorefrontError;
use hardware_storefront_core::{CartItemId, ProductId, Quantity};

use super::Context;

/// Load the cart and print it with totals.
pub async fn show(ctx: &Context) -> Result<(), StorefrontError> {
    ctx.resolve_session().await;

    match ctx.cart.fetch().await {
        FetchOutcome::Cleared => {
            println!("Sign in to see your cart");
            return Ok(());
        }
        FetchOutcome::Failed => {
            let state = ctx.cart.state();
            println!(
                "Could not load cart: {}",
                state.error.as_deref().unwrap_or("session expired")
            );
            return Ok(());
        }
        FetchOutcome::Loaded(_) | FetchOutcome::Skipped(_) => {}
    }

    print_cart(ctx);
    Ok(())
}

/// Add a product.
pub async fn add(ctx: &Context, product_id: &str, quantity: i64) -> Result<(), StorefrontError> {
    ctx.resolve_session().await;
    let quantity = Quantity::new(quantity).map_err(CartError::from)?;
    ctx.cart.add(&ProductId::new(product_id), quantity).await?;
    print_cart(ctx);
    Ok(())
}

/// Set a line's quantity.
pub async fn update(ctx: &Context, item_id: &str, quantity: i64) -> Result<(), StorefrontError> {
    ctx.resolve_session().await;
    // Load lines first so the stock check has a snapshot to work with.
    ctx.cart.fetch().await;
    ctx.cart
        .update_quantity(&CartItemId::new(item_id), quantity)
        .await?;
    print_cart(ctx);
    Ok(())
}

/// Remove a line.
pub async fn remove(ctx: &Context, item_id: &str) -> Result<(), StorefrontError> {
    ctx.resolve_session().await;
    ctx.cart.fetch().await;
    ctx.cart.remove(&CartItemId::new(item_id)).await?;
    print_cart(ctx);
    Ok(())
}

/// Empty the cart.
pub async fn clear(ctx: &Context) -> Result<(), StorefrontError> {
    ctx.resolve_session().await;
    ctx.cart.clear().await?;
    println!("Cart cleared");
    Ok(())
}

fn print_cart(ctx: &Context) {
    let state = ctx.cart.state();
    if state.is_empty() {
        println!("Your cart is empty");
        return;
    }

    for item in &state.items {
        println!(
            "{:<12} {:<40} {:>4} x {:>10} = {:>10}",
            item.id,
            item.product.name,
            item.quantity,
            item.product.price,
            item.line_total()
        );
    }
    println!(
        "{} items, total {}",
        state.total_items(),
        state.total_amount()
    );
}
