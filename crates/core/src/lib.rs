//! Hardware Storefront Core - Shared types library.
//!
//! This crate provides the domain types used across the storefront workspace:
//! - `storefront` - HTTP client, session, auth and cart state managers
//! - `cli` - Command-line shopper built on the storefront library
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, quantities, emails, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
