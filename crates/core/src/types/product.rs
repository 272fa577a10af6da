//! Product, option and variant model.
//!
//! Products are read-only snapshots of catalog data. Every variant is
//! checked at load time to name exactly one allowed value per product
//! option, so the matcher never has to guess about malformed data.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::{ProductId, VariantId};
use super::price::Price;

/// Catalog data that violates the option coverage rules.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProductError {
    #[error("variant {variant} is missing option {option}")]
    MissingOption { variant: VariantId, option: String },
    #[error("variant {variant} lists option {option} more than once")]
    DuplicateOption { variant: VariantId, option: String },
    #[error("variant {variant} names unknown option {option}")]
    UnknownOption { variant: VariantId, option: String },
    #[error("variant {variant} uses value {value} not allowed for option {option}")]
    ValueNotAllowed {
        variant: VariantId,
        option: String,
        value: String,
    },
    #[error("variants {first} and {second} share the same option combination")]
    DuplicateCombination { first: VariantId, second: VariantId },
    #[error("product defines option {0} more than once")]
    DuplicateOptionName(String),
}

/// A single `{name, value}` pair on a variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectedOption {
    /// Option name (e.g., "Size").
    pub name: String,
    /// Option value (e.g., "M").
    pub value: String,
}

impl SelectedOption {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A named product axis with an ordered position and its allowed values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductOption {
    /// Option name (e.g., "Color").
    pub name: String,
    /// 1-based display position.
    pub position: u32,
    /// Allowed values, in display order.
    pub values: Vec<String>,
}

/// A purchasable configuration of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub title: String,
    pub price: Price,
    pub in_stock: bool,
    /// Merchandising override that hides stock regardless of inventory.
    pub force_out_of_stock: bool,
    pub sold_out: bool,
    pub options: Vec<SelectedOption>,
}

impl Variant {
    /// Whether the variant can be added to a cart right now.
    #[must_use]
    pub const fn is_orderable(&self) -> bool {
        self.in_stock && !self.force_out_of_stock && !self.sold_out
    }

    /// Value this variant carries for the named option.
    #[must_use]
    pub fn option_value(&self, name: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.name == name)
            .map(|o| o.value.as_str())
    }

    /// Order-independent comparison of the full option set.
    ///
    /// Both sides must contain each other, so a selection that repeats an
    /// option name never matches.
    #[must_use]
    pub fn matches(&self, selection: &[SelectedOption]) -> bool {
        self.options.len() == selection.len()
            && selection.iter().all(|wanted| self.options.contains(wanted))
            && self.options.iter().all(|own| selection.contains(own))
    }
}

/// A product with its options and variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    /// URL handle.
    pub slug: String,
    pub options: Vec<ProductOption>,
    pub variants: Vec<Variant>,
}

impl Product {
    /// Build a product, validating option coverage of every variant.
    ///
    /// # Errors
    ///
    /// Returns the first `ProductError` found by [`Product::validate`].
    pub fn new(
        id: ProductId,
        title: impl Into<String>,
        slug: impl Into<String>,
        options: Vec<ProductOption>,
        variants: Vec<Variant>,
    ) -> Result<Self, ProductError> {
        let product = Self {
            id,
            title: title.into(),
            slug: slug.into(),
            options,
            variants,
        };
        product.validate()?;
        Ok(product)
    }

    /// Check that each variant has exactly one allowed value per option and
    /// that no two variants share a combination.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), ProductError> {
        let mut option_names = HashSet::new();
        for option in &self.options {
            if !option_names.insert(option.name.as_str()) {
                return Err(ProductError::DuplicateOptionName(option.name.clone()));
            }
        }

        for variant in &self.variants {
            let mut seen = HashSet::new();
            for selected in &variant.options {
                let Some(option) = self.option(&selected.name) else {
                    return Err(ProductError::UnknownOption {
                        variant: variant.id.clone(),
                        option: selected.name.clone(),
                    });
                };
                if !seen.insert(selected.name.as_str()) {
                    return Err(ProductError::DuplicateOption {
                        variant: variant.id.clone(),
                        option: selected.name.clone(),
                    });
                }
                if !option.values.contains(&selected.value) {
                    return Err(ProductError::ValueNotAllowed {
                        variant: variant.id.clone(),
                        option: selected.name.clone(),
                        value: selected.value.clone(),
                    });
                }
            }
            if let Some(missing) = self
                .options
                .iter()
                .find(|o| !seen.contains(o.name.as_str()))
            {
                return Err(ProductError::MissingOption {
                    variant: variant.id.clone(),
                    option: missing.name.clone(),
                });
            }
        }

        for (i, variant) in self.variants.iter().enumerate() {
            if let Some(other) = self
                .variants
                .iter()
                .skip(i + 1)
                .find(|other| other.matches(&variant.options))
            {
                return Err(ProductError::DuplicateCombination {
                    first: variant.id.clone(),
                    second: other.id.clone(),
                });
            }
        }

        Ok(())
    }

    /// Look up an option by name.
    #[must_use]
    pub fn option(&self, name: &str) -> Option<&ProductOption> {
        self.options.iter().find(|o| o.name == name)
    }

    /// Look up a variant by ID.
    #[must_use]
    pub fn variant(&self, id: &VariantId) -> Option<&Variant> {
        self.variants.iter().find(|v| &v.id == id)
    }

    /// The variant whose option set equals `selection`, ignoring order.
    #[must_use]
    pub fn find_variant(&self, selection: &[SelectedOption]) -> Option<&Variant> {
        self.variants.iter().find(|v| v.matches(selection))
    }

    /// First orderable variant, falling back to the first variant.
    #[must_use]
    pub fn default_variant(&self) -> Option<&Variant> {
        self.variants
            .iter()
            .find(|v| v.is_orderable())
            .or_else(|| self.variants.first())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::price::CurrencyCode;
    use rust_decimal::Decimal;

    fn option(name: &str, position: u32, values: &[&str]) -> ProductOption {
        ProductOption {
            name: name.to_string(),
            position,
            values: values.iter().map(ToString::to_string).collect(),
        }
    }

    fn variant(id: &str, options: &[(&str, &str)]) -> Variant {
        Variant {
            id: VariantId::new(id),
            title: id.to_string(),
            price: Price::new(Decimal::new(2500, 2), CurrencyCode::USD),
            in_stock: true,
            force_out_of_stock: false,
            sold_out: false,
            options: options
                .iter()
                .map(|(n, v)| SelectedOption::new(*n, *v))
                .collect(),
        }
    }

    fn build(variants: Vec<Variant>) -> Result<Product, ProductError> {
        Product::new(
            ProductId::new("gid://shopify/Product/1"),
            "Tee",
            "tee",
            vec![
                option("Size", 1, &["S", "M"]),
                option("Color", 2, &["Red", "Blue"]),
            ],
            variants,
        )
    }

    #[test]
    fn test_matches_ignores_order_but_not_repeats() {
        let v = variant("m-red", &[("Size", "M"), ("Color", "Red")]);
        assert!(v.matches(&[
            SelectedOption::new("Color", "Red"),
            SelectedOption::new("Size", "M"),
        ]));
        assert!(!v.matches(&[
            SelectedOption::new("Size", "M"),
            SelectedOption::new("Size", "M"),
        ]));
        assert!(!v.matches(&[SelectedOption::new("Size", "M")]));
    }

    #[test]
    fn test_valid_product_loads() {
        let product = build(vec![
            variant("s-red", &[("Size", "S"), ("Color", "Red")]),
            variant("m-blue", &[("Color", "Blue"), ("Size", "M")]),
        ])
        .unwrap();
        assert_eq!(product.variants.len(), 2);
    }

    #[test]
    fn test_missing_option_rejected() {
        let err = build(vec![variant("s", &[("Size", "S")])]).unwrap_err();
        assert_eq!(
            err,
            ProductError::MissingOption {
                variant: VariantId::new("s"),
                option: "Color".to_string(),
            }
        );
    }

    #[test]
    fn test_duplicate_option_rejected() {
        let err = build(vec![variant(
            "x",
            &[("Size", "S"), ("Size", "M"), ("Color", "Red")],
        )])
        .unwrap_err();
        assert!(matches!(err, ProductError::DuplicateOption { .. }));
    }

    #[test]
    fn test_unknown_option_rejected() {
        let err = build(vec![variant(
            "x",
            &[("Size", "S"), ("Color", "Red"), ("Fit", "Slim")],
        )])
        .unwrap_err();
        assert!(matches!(err, ProductError::UnknownOption { .. }));
    }

    #[test]
    fn test_value_outside_option_rejected() {
        let err = build(vec![variant("x", &[("Size", "XL"), ("Color", "Red")])]).unwrap_err();
        assert!(matches!(err, ProductError::ValueNotAllowed { .. }));
    }

    #[test]
    fn test_duplicate_combination_rejected() {
        let err = build(vec![
            variant("a", &[("Size", "S"), ("Color", "Red")]),
            variant("b", &[("Color", "Red"), ("Size", "S")]),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            ProductError::DuplicateCombination {
                first: VariantId::new("a"),
                second: VariantId::new("b"),
            }
        );
    }

    #[test]
    fn test_orderable_requires_all_stock_flags() {
        let mut v = variant("a", &[("Size", "S"), ("Color", "Red")]);
        assert!(v.is_orderable());
        v.force_out_of_stock = true;
        assert!(!v.is_orderable());
        v.force_out_of_stock = false;
        v.in_stock = false;
        assert!(!v.is_orderable());
    }

    #[test]
    fn test_default_variant_prefers_orderable() {
        let mut first = variant("a", &[("Size", "S"), ("Color", "Red")]);
        first.in_stock = false;
        let product = build(vec![
            first,
            variant("b", &[("Size", "M"), ("Color", "Red")]),
        ])
        .unwrap();
        assert_eq!(product.default_variant().unwrap().id.as_str(), "b");
    }
}
