//! Tolerant decoding of list payloads.
//!
//! Backend endpoints are inconsistent about wrapping collections: some return
//! a bare JSON array, others an object with the array under `items` (or
//! `data` on older routes, `products` on the catalog). Both shapes decode to
//! the same `Vec`.

use serde::Deserialize;
use serde::de::DeserializeOwned;

/// A collection in any of the shapes the backend uses.
#[derive(Debug, Deserialize)]
#[serde(untagged, bound = "T: DeserializeOwned")]
pub enum ListPayload<T> {
    Bare(Vec<T>),
    Items { items: Vec<T> },
    Data { data: Vec<T> },
}

impl<T> ListPayload<T> {
    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        match self {
            Self::Bare(items) | Self::Items { items } | Self::Data { data: items } => items,
        }
    }
}

/// A paginated collection with optional paging metadata.
///
/// Missing metadata is filled in by the caller from the request that produced
/// the page.
#[derive(Debug, Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
pub struct PagePayload<T> {
    #[serde(alias = "products", alias = "data")]
    pub items: Vec<T>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// A page in either the paginated or the bare-list shape.
#[derive(Debug, Deserialize)]
#[serde(untagged, bound = "T: DeserializeOwned")]
pub enum AnyPage<T> {
    Paged(PagePayload<T>),
    Bare(Vec<T>),
}

impl<T> AnyPage<T> {
    /// Normalize to a paginated payload.
    #[must_use]
    pub fn into_page(self) -> PagePayload<T> {
        match self {
            Self::Paged(page) => page,
            Self::Bare(items) => PagePayload {
                items,
                total: None,
                page: None,
                limit: None,
            },
        }
    }
}

/// A single resource that may come wrapped under `data`.
#[derive(Debug, Deserialize)]
#[serde(untagged, bound = "T: DeserializeOwned")]
pub enum OnePayload<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> OnePayload<T> {
    #[must_use]
    pub fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data } | Self::Bare(data) => data,
        }
    }
}
