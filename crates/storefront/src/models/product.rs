//! Product types and catalog queries.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use hardware_storefront_core::{CategoryId, ProductId};

/// A product as listed in the catalog.
///
/// Cart items embed a copy of this taken when the cart was fetched; that copy
/// is not kept fresh and is replaced wholesale on the next cart reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Unit price in the store currency.
    pub price: Decimal,
    /// Units available. Negative values from the backend are clamped by
    /// [`Product::sanitize`].
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub brand: Option<String>,
}

impl Product {
    /// Normalize backend data before it is cached or shown.
    ///
    /// Trims the name and slug, drops blank image URLs and clamps negative
    /// stock to zero.
    #[must_use]
    pub fn sanitize(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.slug = self.slug.trim().to_string();
        self.images.retain(|url| !url.trim().is_empty());
        self.stock = self.stock.max(0);
        self
    }

    /// Whether any units can be ordered.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }

    /// First image, used as the thumbnail.
    #[must_use]
    pub fn thumbnail(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// One page of a product listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductPage {
    pub items: Vec<Product>,
    /// Total number of matching products across all pages.
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

/// Sort orders accepted by the product listing endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductSort {
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl ProductSort {
    /// Query parameter value.
    #[must_use]
    pub const fn as_param(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::Name => "name",
        }
    }
}

impl std::str::FromStr for ProductSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(Self::Newest),
            "price_asc" => Ok(Self::PriceAsc),
            "price_desc" => Ok(Self::PriceDesc),
            "name" => Ok(Self::Name),
            _ => Err(format!("invalid sort order: {s}")),
        }
    }
}

/// Filters for a product listing request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductQuery {
    pub page: u32,
    pub limit: u32,
    pub category: Option<String>,
    pub search: Option<String>,
    pub sort: Option<ProductSort>,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 20,
            category: None,
            search: None,
            sort: None,
        }
    }
}

impl ProductQuery {
    /// Query string pairs in a stable order.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.max(1).to_string()),
            ("limit", self.limit.max(1).to_string()),
        ];
        if let Some(category) = &self.category {
            pairs.push(("category", category.clone()));
        }
        if let Some(search) = self.search.as_deref().map(str::trim)
            && !search.is_empty()
        {
            pairs.push(("search", search.to_string()));
        }
        if let Some(sort) = self.sort {
            pairs.push(("sort", sort.as_param().to_string()));
        }
        pairs
    }

    /// Whether this is a free-text search (search results are never cached).
    #[must_use]
    pub fn is_search(&self) -> bool {
        self.search.as_deref().is_some_and(|s| !s.trim().is_empty())
    }
}
