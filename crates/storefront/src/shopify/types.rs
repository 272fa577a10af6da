//! Domain types for the Shopify Storefront cart API.
//!
//! These types provide a clean API separate from the raw GraphQL response
//! shapes in `storefront::queries`. Products are converted straight into
//! [`julie_core::Product`].

use julie_core::{CartId, LineId, VariantId};
use serde::{Deserialize, Serialize};

// =============================================================================
// Money Types
// =============================================================================

/// Monetary amount with currency code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Decimal amount as string (preserves precision).
    pub amount: String,
    /// ISO 4217 currency code.
    pub currency_code: String,
}

// =============================================================================
// Cart Types
// =============================================================================

/// Custom attribute (key-value pair).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute key.
    pub key: String,
    /// Attribute value.
    pub value: Option<String>,
}

/// Input for custom attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeInput {
    pub key: String,
    pub value: String,
}

/// Merchandise in a cart line (simplified product variant info).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartMerchandise {
    /// Variant ID.
    pub id: VariantId,
    /// Variant title ("Default Title" for single-variant products).
    pub title: String,
    /// Current unit price.
    pub price: Money,
    /// Variant image URL.
    pub image_url: Option<String>,
    /// Parent product handle.
    pub product_handle: String,
    /// Parent product title.
    pub product_title: String,
}

/// A line item in the cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    /// Cart line ID.
    pub id: LineId,
    /// Quantity.
    pub quantity: i64,
    /// Price per unit.
    pub amount_per_quantity: Money,
    /// Total (after discounts).
    pub total_amount: Money,
    /// Product variant.
    pub merchandise: CartMerchandise,
}

/// Cart cost summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartCost {
    /// Subtotal before tax/shipping.
    pub subtotal: Money,
    /// Total amount.
    pub total: Money,
}

/// A shopping cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    /// Cart ID.
    pub id: CartId,
    /// Checkout URL issued by Shopify.
    pub checkout_url: String,
    /// Total item quantity.
    pub total_quantity: i64,
    /// Custom attributes.
    pub attributes: Vec<Attribute>,
    /// Cart cost summary.
    pub cost: CartCost,
    /// Cart lines.
    pub lines: Vec<CartLine>,
}

/// Input for adding a line to cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineInput {
    /// Product variant ID.
    pub merchandise_id: VariantId,
    /// Quantity to add.
    pub quantity: i64,
}

impl CartLineInput {
    #[must_use]
    pub fn new(variant_id: &VariantId, quantity: u32) -> Self {
        Self {
            merchandise_id: variant_id.clone(),
            quantity: i64::from(quantity),
        }
    }
}

/// Input for updating a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineUpdateInput {
    /// Cart line ID.
    pub id: LineId,
    /// New quantity.
    pub quantity: i64,
}

impl CartLineUpdateInput {
    #[must_use]
    pub fn new(line_id: &LineId, quantity: u32) -> Self {
        Self {
            id: line_id.clone(),
            quantity: i64::from(quantity),
        }
    }
}

/// User error from cart mutations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartUserError {
    /// Error code.
    pub code: Option<String>,
    /// Field path that caused the error.
    pub field: Option<Vec<String>>,
    /// Error message.
    pub message: String,
}

impl CartUserError {
    /// Whether Shopify is saying the cart itself no longer exists (expired or
    /// completed at checkout).
    #[must_use]
    pub fn is_missing_cart(&self) -> bool {
        self.field
            .as_deref()
            .is_some_and(|path| path.iter().any(|p| p == "cartId"))
            || self.message.to_ascii_lowercase().contains("cart does not exist")
    }
}
