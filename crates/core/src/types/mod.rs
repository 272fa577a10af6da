//! Core types for the Julie storefront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod price;
pub mod product;

pub use id::*;
pub use price::{CurrencyCode, Price, PriceError};
pub use product::{Product, ProductError, ProductOption, SelectedOption, Variant};
