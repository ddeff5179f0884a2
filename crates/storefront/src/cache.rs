//! In-memory cache for catalog responses.
//!
//! Products and categories change rarely and are public, so they are cached
//! with a TTL. Cart, order and account data are never cached.

use std::sync::Arc;

use moka::future::Cache;
use tracing::debug;

use crate::config::CacheConfig;
use crate::models::{Category, Product, ProductPage, ProductQuery};

/// Cache key for catalog entries.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Product(String),
    ProductBySlug(String),
    Products(ProductQuery),
    Categories,
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Box<Product>),
    Products(Arc<ProductPage>),
    Categories(Arc<Vec<Category>>),
}

/// Shared catalog cache. Clones share storage.
#[derive(Clone)]
pub struct CatalogCache {
    inner: Cache<CacheKey, CacheValue>,
}

impl std::fmt::Debug for CatalogCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogCache")
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

impl CatalogCache {
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        let inner = Cache::builder()
            .max_capacity(config.capacity)
            .time_to_live(config.ttl)
            .build();
        Self { inner }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        let value = self.inner.get(key).await;
        if value.is_some() {
            debug!(?key, "Cache hit");
        }
        value
    }

    pub async fn insert(&self, key: CacheKey, value: CacheValue) {
        self.inner.insert(key, value).await;
    }

    /// Drop one entry.
    pub async fn invalidate(&self, key: &CacheKey) {
        self.inner.invalidate(key).await;
    }

    /// Drop a product from both of its keys.
    pub async fn invalidate_product(&self, product: &Product) {
        self.inner
            .invalidate(&CacheKey::Product(product.id.to_string()))
            .await;
        self.inner
            .invalidate(&CacheKey::ProductBySlug(product.slug.clone()))
            .await;
    }

    /// Invalidate all cached data.
    pub async fn invalidate_all(&self) {
        self.inner.invalidate_all();
        self.inner.run_pending_tasks().await;
    }

    /// Number of live entries (approximate until pending tasks run).
    pub async fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }
}
