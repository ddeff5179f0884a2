//! Domain models exchanged with the backend API.
//!
//! The backend speaks camelCase JSON; every model here maps it onto typed
//! Rust values so the state managers never see raw JSON.

pub mod cart;
pub mod category;
pub mod order;
pub mod payment;
pub mod product;
pub mod user;

pub use cart::CartItem;
pub use category::Category;
pub use order::{NewOrder, Order, OrderItem};
pub use payment::{PaymentSession, PaymentState};
pub use product::{Product, ProductPage, ProductQuery, ProductSort};
pub use user::{ProfileUpdate, User};
