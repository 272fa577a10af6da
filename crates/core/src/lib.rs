//! Julie Core - Shared domain types and storefront logic.
//!
//! This crate provides the types and rules used by the storefront:
//! - `storefront` - Public JSON API in front of Shopify
//! - `integration-tests` - End-to-end cart and checkout flows
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! sessions, no HTTP clients. Anything that needs the clock takes `now` as an
//! argument.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, prices, and the product/option/variant model
//! - [`variant`] - Resolving option changes to variants
//! - [`tracking`] - UTM attribution records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod tracking;
pub mod types;
pub mod variant;

pub use types::*;
