//! Catalog commands.

use hardware_storefront::error::StorefrontError;
use hardware_storefront::models::{Product, ProductQuery};
use hardware_storefront::services::Catalog;
use hardware_storefront_core::ProductId;

use super::Context;

/// Print one page of products.
pub async fn list_products(ctx: &Context, query: &ProductQuery) -> Result<(), StorefrontError> {
    let page = Catalog::new(&ctx.api, &ctx.cache).products(query).await?;

    if page.items.is_empty() {
        println!("No products found");
        return Ok(());
    }
    for product in &page.items {
        println!("{}", summary(product));
    }
    println!(
        "Page {} ({} per page), {} products in total",
        page.page, page.limit, page.total
    );
    Ok(())
}

/// Print one product, by ID or by slug.
pub async fn show_product(ctx: &Context, id: &str, by_slug: bool) -> Result<(), StorefrontError> {
    let catalog = Catalog::new(&ctx.api, &ctx.cache);
    let product = if by_slug {
        catalog.product_by_slug(id).await?
    } else {
        catalog.product(&ProductId::new(id)).await?
    };

    println!("{}", summary(&product));
    if let Some(brand) = &product.brand {
        println!("  brand: {brand}");
    }
    if let Some(description) = &product.description {
        println!("  {description}");
    }
    if let Some(image) = product.thumbnail() {
        println!("  image: {image}");
    }
    Ok(())
}

/// Print every category.
pub async fn list_categories(ctx: &Context) -> Result<(), StorefrontError> {
    let categories = Catalog::new(&ctx.api, &ctx.cache).categories().await?;
    for category in &categories {
        println!("{:<24} {}", category.slug, category.name);
    }
    Ok(())
}

fn summary(product: &Product) -> String {
    let stock = if product.in_stock() {
        format!("{} in stock", product.stock)
    } else {
        "out of stock".to_string()
    };
    format!(
        "{:<12} {:<40} {:>10}  {stock}",
        product.id, product.name, product.price
    )
}
