//! Typed wrappers over the catalog, order and payment endpoints.
//!
//! Each service borrows the shared [`ApiClient`](crate::api::ApiClient), so
//! rate limiting and session recovery apply to every call.
//!
//! - [`Catalog`] - products and categories, cached in a [`CatalogCache`](crate::cache::CatalogCache)
//! - [`Orders`] - order placement and history
//! - [`Payments`] - payment sessions for placed orders

pub mod catalog;
pub mod orders;
pub mod payments;

pub use catalog::Catalog;
pub use orders::{OrderError, Orders};
pub use payments::{PaymentError, Payments};
