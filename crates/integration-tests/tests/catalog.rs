//! Integration tests for the catalog, order and payment services.
//!
//! Run with: cargo test -p hardware-storefront-integration-tests

use rust_decimal::Decimal;

use hardware_storefront::ApiError;
use hardware_storefront::models::{NewOrder, ProductQuery};
use hardware_storefront::services::{Catalog, OrderError, Orders, Payments};
use hardware_storefront::CatalogCache;
use hardware_storefront_core::{OrderId, OrderStatus, PaymentId, PaymentMethod, PaymentStatus, ProductId};
use hardware_storefront_integration_tests::Harness;

fn cache(harness: &Harness) -> CatalogCache {
    CatalogCache::new(&harness.backend.config().cache)
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
async fn test_product_listing_is_sanitized_and_cached() {
    let harness = Harness::start().await;
    let cache = cache(&harness);
    let catalog = Catalog::new(&harness.api, &cache);

    let page = catalog
        .products(&ProductQuery::default())
        .await
        .expect("Listing should succeed");

    assert_eq!(page.total, 2);
    assert_eq!(page.page, 1);
    let hammer = &page.items[0];
    assert_eq!(hammer.name, "Claw Hammer");
    assert_eq!(hammer.price, Decimal::from(100));
    assert_eq!(hammer.images.len(), 1);

    let again = catalog
        .products(&ProductQuery::default())
        .await
        .expect("Cached listing");
    assert_eq!(again, page);
    assert_eq!(harness.state().hits("GET /products"), 1);
}

#[tokio::test]
async fn test_search_results_are_not_cached() {
    let harness = Harness::start().await;
    let cache = cache(&harness);
    let catalog = Catalog::new(&harness.api, &cache);
    let query = ProductQuery {
        search: Some("tape".to_string()),
        ..ProductQuery::default()
    };

    for _ in 0..2 {
        let page = catalog.products(&query).await.expect("Search should succeed");
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, ProductId::new("p2"));
    }
    assert_eq!(harness.state().hits("GET /products"), 2);
}

#[tokio::test]
async fn test_product_lookup_by_id_and_slug() {
    let harness = Harness::start().await;
    let cache = cache(&harness);
    let catalog = Catalog::new(&harness.api, &cache);

    let by_id = catalog
        .product(&ProductId::new("p1"))
        .await
        .expect("Product by ID");
    assert_eq!(by_id.slug, "claw-hammer");

    // Fetching by ID also caches under the slug.
    let by_slug = catalog
        .product_by_slug("claw-hammer")
        .await
        .expect("Product by slug");
    assert_eq!(by_slug, by_id);
    assert_eq!(harness.state().hits("GET /products/{id}"), 1);
    assert_eq!(harness.state().hits("GET /products/slug/{slug}"), 0);

    let tape = catalog
        .product_by_slug("tape-measure")
        .await
        .expect("Uncached slug");
    assert_eq!(tape.id, ProductId::new("p2"));
    assert_eq!(harness.state().hits("GET /products/slug/{slug}"), 1);
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let harness = Harness::start().await;
    let cache = cache(&harness);
    let catalog = Catalog::new(&harness.api, &cache);

    let err = catalog
        .product(&ProductId::new("p404"))
        .await
        .expect_err("Unknown product");
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_categories_are_cached() {
    let harness = Harness::start().await;
    let cache = cache(&harness);
    let catalog = Catalog::new(&harness.api, &cache);

    let categories = catalog.categories().await.expect("Categories");
    let names: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["Hand Tools", "Power Tools"]);

    catalog.categories().await.expect("Cached categories");
    assert_eq!(harness.state().hits("GET /categories"), 1);

    cache.invalidate_all().await;
    catalog.categories().await.expect("Categories after invalidation");
    assert_eq!(harness.state().hits("GET /categories"), 2);
}

// ============================================================================
// Orders
// ============================================================================

#[tokio::test]
async fn test_create_and_list_orders() {
    let harness = Harness::start().await;
    harness.sign_in().await;
    let orders = Orders::new(&harness.api);

    let order = orders
        .create_order(&NewOrder {
            shipping_address: "  1 Main St ".to_string(),
            payment_method: PaymentMethod::BankTransfer,
            notes: None,
        })
        .await
        .expect("Order should be placed");

    assert_eq!(order.id, OrderId::new("ord-1"));
    assert_eq!(order.shipping_address, "1 Main St");
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_amount, Decimal::from(250));

    let listed = orders.orders().await.expect("Order list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, order.id);
}

#[tokio::test]
async fn test_order_lookup() {
    let harness = Harness::start().await;
    harness.sign_in().await;

    let order = Orders::new(&harness.api)
        .order(&OrderId::new("ord-1"))
        .await
        .expect("Order lookup");

    assert_eq!(order.id, OrderId::new("ord-1"));
    assert_eq!(order.shipping_address, "1 Main St");
    assert_eq!(order.total_amount, Decimal::from(250));
    assert_eq!(harness.state().hits("GET /orders/{id}"), 1);
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
    let harness = Harness::start().await;
    harness.sign_in().await;

    let err = Orders::new(&harness.api)
        .order(&OrderId::new("ord-404"))
        .await
        .expect_err("Unknown order");

    assert!(matches!(err, ApiError::NotFound(_)));
    assert_eq!(harness.state().hits("POST /auth/refresh"), 0);
}

#[tokio::test]
async fn test_blank_shipping_address_sends_nothing() {
    let harness = Harness::start().await;
    harness.sign_in().await;
    let before = harness.state().total_hits();

    let err = Orders::new(&harness.api)
        .create_order(&NewOrder {
            shipping_address: "   ".to_string(),
            payment_method: PaymentMethod::Card,
            notes: None,
        })
        .await
        .expect_err("Blank address");

    assert!(matches!(err, OrderError::MissingShippingAddress));
    assert_eq!(harness.state().total_hits(), before);
}

// ============================================================================
// Payments
// ============================================================================

#[tokio::test]
async fn test_card_payment_returns_redirect() {
    let harness = Harness::start().await;
    harness.sign_in().await;
    let payments = Payments::new(&harness.api);

    let session = payments
        .initiate_payment(&OrderId::new("ord-1"), PaymentMethod::Card)
        .await
        .expect("Payment should start");
    assert_eq!(session.payment_id, PaymentId::new("pay-1"));
    assert_eq!(session.status, PaymentStatus::Pending);
    assert!(session.redirect_url.is_some());

    let state = payments
        .payment_status(&session.payment_id)
        .await
        .expect("Payment status");
    assert_eq!(state.status, PaymentStatus::Completed);
    assert_eq!(state.order_id, OrderId::new("ord-1"));
    assert_eq!(state.amount, Decimal::from(250));
}

#[tokio::test]
async fn test_offline_payment_needs_no_redirect() {
    let harness = Harness::start().await;
    harness.sign_in().await;

    let session = Payments::new(&harness.api)
        .initiate_payment(&OrderId::new("ord-1"), PaymentMethod::CashOnDelivery)
        .await
        .expect("Payment should start");
    assert!(session.redirect_url.is_none());
}
