//! Product and category browsing.

use std::sync::Arc;

use tracing::instrument;

use hardware_storefront_core::ProductId;

use crate::api::{ApiClient, ApiError, ApiRequest};
use crate::cache::{CacheKey, CacheValue, CatalogCache};
use crate::decode::{AnyPage, OnePayload};
use crate::models::{Category, Product, ProductPage, ProductQuery};

/// Catalog access. Unsearched listings, single products and categories are
/// served from the cache while fresh.
#[derive(Debug, Clone, Copy)]
pub struct Catalog<'a> {
    api: &'a ApiClient,
    cache: &'a CatalogCache,
}

impl<'a> Catalog<'a> {
    #[must_use]
    pub const fn new(api: &'a ApiClient, cache: &'a CatalogCache) -> Self {
        Self { api, cache }
    }

    /// One page of products.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the body is not a product
    /// page.
    #[instrument(skip(self))]
    pub async fn products(&self, query: &ProductQuery) -> Result<ProductPage, ApiError> {
        let key = CacheKey::Products(query.clone());
        if !query.is_search()
            && let Some(CacheValue::Products(page)) = self.cache.get(&key).await
        {
            return Ok((*page).clone());
        }

        let payload = self
            .api
            .send(ApiRequest::get("/products").query(query.to_pairs()))
            .await?
            .json::<AnyPage<Product>>("product page")?
            .into_page();

        let items: Vec<Product> = payload.items.into_iter().map(Product::sanitize).collect();
        let page = ProductPage {
            total: payload
                .total
                .unwrap_or_else(|| u64::try_from(items.len()).unwrap_or(u64::MAX)),
            page: payload.page.unwrap_or_else(|| query.page.max(1)),
            limit: payload.limit.unwrap_or_else(|| query.limit.max(1)),
            items,
        };

        if !query.is_search() {
            self.cache
                .insert(key, CacheValue::Products(Arc::new(page.clone())))
                .await;
        }
        Ok(page)
    }

    /// A product by ID.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if there is no such product.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn product(&self, id: &ProductId) -> Result<Product, ApiError> {
        let key = CacheKey::Product(id.to_string());
        if let Some(CacheValue::Product(product)) = self.cache.get(&key).await {
            return Ok(*product);
        }

        let path = format!("/products/{}", urlencoding::encode(id.as_str()));
        self.fetch_product(path).await
    }

    /// A product by its URL slug.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if there is no such product.
    #[instrument(skip(self))]
    pub async fn product_by_slug(&self, slug: &str) -> Result<Product, ApiError> {
        let key = CacheKey::ProductBySlug(slug.to_string());
        if let Some(CacheValue::Product(product)) = self.cache.get(&key).await {
            return Ok(*product);
        }

        let path = format!("/products/slug/{}", urlencoding::encode(slug));
        self.fetch_product(path).await
    }

    /// All categories.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the body is not a list.
    #[instrument(skip(self))]
    pub async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        if let Some(CacheValue::Categories(categories)) =
            self.cache.get(&CacheKey::Categories).await
        {
            return Ok((*categories).clone());
        }

        let categories: Vec<Category> = self
            .api
            .send(ApiRequest::get("/categories"))
            .await?
            .json_list("categories")?;

        self.cache
            .insert(
                CacheKey::Categories,
                CacheValue::Categories(Arc::new(categories.clone())),
            )
            .await;
        Ok(categories)
    }

    /// Fetch, sanitize and cache a product under both its ID and slug.
    async fn fetch_product(&self, path: String) -> Result<Product, ApiError> {
        let product = self
            .api
            .send(ApiRequest::get(path))
            .await?
            .json::<OnePayload<Product>>("product")?
            .into_inner()
            .sanitize();

        self.cache
            .insert(
                CacheKey::Product(product.id.to_string()),
                CacheValue::Product(Box::new(product.clone())),
            )
            .await;
        if !product.slug.is_empty() {
            self.cache
                .insert(
                    CacheKey::ProductBySlug(product.slug.clone()),
                    CacheValue::Product(Box::new(product.clone())),
                )
                .await;
        }
        Ok(product)
    }
}
