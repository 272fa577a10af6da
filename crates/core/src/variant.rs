//! Resolving option changes to variants.
//!
//! When a shopper changes one option (say Color) on the product page, the
//! new variant is the one carrying every other active value plus the new
//! one. A combination with no variant is never substituted with a "close"
//! variant; it is reported as unavailable instead.

use serde::{Deserialize, Serialize};

use crate::types::{Product, SelectedOption, Variant, VariantId};

/// A request to change a single option value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionChange {
    pub option: String,
    pub value: String,
}

impl OptionChange {
    #[must_use]
    pub fn new(option: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            option: option.into(),
            value: value.into(),
        }
    }
}

/// How strictly an option value must be reachable to count as orderable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Must match every other active option and be in stock.
    Strict,
    /// Only the changed option's value must match, in any in-stock variant.
    Lenient,
}

/// Display state of one option value relative to the active variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueAvailability {
    Available,
    SoldOut,
    /// No variant exists for the combination.
    Unavailable,
}

/// Display state for a single option value button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionValueState {
    pub value: String,
    pub selected: bool,
    pub availability: ValueAvailability,
    /// Orderable in at least one combination (lenient mode).
    pub orderable_anywhere: bool,
}

/// Active options with the changed option's entry replaced.
///
/// An option the active variant does not carry is appended.
#[must_use]
pub fn candidate_selection(active: &Variant, change: &OptionChange) -> Vec<SelectedOption> {
    let mut selection: Vec<SelectedOption> = active
        .options
        .iter()
        .filter(|o| o.name != change.option)
        .cloned()
        .collect();
    selection.push(SelectedOption::new(&change.option, &change.value));
    selection
}

/// The variant that exists for the changed combination, regardless of stock.
#[must_use]
pub fn resolve_change<'a>(
    product: &'a Product,
    active: &Variant,
    change: &OptionChange,
) -> Option<&'a Variant> {
    product.find_variant(&candidate_selection(active, change))
}

/// Whether the changed value can be ordered under `mode`.
#[must_use]
pub fn is_orderable(
    product: &Product,
    active: &Variant,
    change: &OptionChange,
    mode: MatchMode,
) -> bool {
    match mode {
        MatchMode::Strict => {
            resolve_change(product, active, change).is_some_and(Variant::is_orderable)
        }
        MatchMode::Lenient => product.variants.iter().any(|v| {
            v.is_orderable() && v.option_value(&change.option) == Some(change.value.as_str())
        }),
    }
}

/// Availability of `change` relative to the active variant.
#[must_use]
pub fn availability(
    product: &Product,
    active: &Variant,
    change: &OptionChange,
) -> ValueAvailability {
    match resolve_change(product, active, change) {
        None => ValueAvailability::Unavailable,
        Some(v) if v.is_orderable() => ValueAvailability::Available,
        Some(_) => ValueAvailability::SoldOut,
    }
}

/// States for every value of the named option, in display order.
#[must_use]
pub fn option_value_states(
    product: &Product,
    active: &Variant,
    option_name: &str,
) -> Vec<OptionValueState> {
    let Some(option) = product.option(option_name) else {
        return Vec::new();
    };

    option
        .values
        .iter()
        .map(|value| {
            let change = OptionChange::new(option_name, value);
            OptionValueState {
                value: value.clone(),
                selected: active.option_value(option_name) == Some(value.as_str()),
                availability: availability(product, active, &change),
                orderable_anywhere: is_orderable(product, active, &change, MatchMode::Lenient),
            }
        })
        .collect()
}

/// A product together with its single active variant.
#[derive(Debug, Clone)]
pub struct ProductSelection {
    product: Product,
    active: Variant,
}

impl ProductSelection {
    /// Start from the given variant, or the product's default variant when
    /// the ID is absent or unknown. Returns `None` for a product with no
    /// variants.
    #[must_use]
    pub fn new(product: Product, active: Option<&VariantId>) -> Option<Self> {
        let active = active
            .and_then(|id| product.variant(id))
            .or_else(|| product.default_variant())?
            .clone();
        Some(Self { product, active })
    }

    #[must_use]
    pub const fn product(&self) -> &Product {
        &self.product
    }

    #[must_use]
    pub const fn active(&self) -> &Variant {
        &self.active
    }

    /// Apply an option change. Returns the new active variant ID, or
    /// `None` (leaving the selection untouched) when no variant exists.
    pub fn select(&mut self, change: &OptionChange) -> Option<VariantId> {
        let next = resolve_change(&self.product, &self.active, change)?.clone();
        let id = next.id.clone();
        self.active = next;
        Some(id)
    }

    /// Value states for every option of the product.
    #[must_use]
    pub fn option_states(&self) -> Vec<(String, Vec<OptionValueState>)> {
        self.product
            .options
            .iter()
            .map(|o| {
                (
                    o.name.clone(),
                    option_value_states(&self.product, &self.active, &o.name),
                )
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{CurrencyCode, Price, ProductId, ProductOption};
    use rust_decimal::Decimal;

    const SIZES: [&str; 3] = ["S", "M", "L"];
    const COLORS: [&str; 2] = ["Red", "Blue"];

    fn variant_id(size: &str, color: &str) -> VariantId {
        VariantId::new(format!("{size}-{color}"))
    }

    /// Size:[S,M,L] x Color:[Red,Blue], all in stock.
    fn tee() -> Product {
        let variants = SIZES
            .iter()
            .flat_map(|size| COLORS.iter().map(move |color| (*size, *color)))
            .map(|(size, color)| Variant {
                id: variant_id(size, color),
                title: format!("{size} / {color}"),
                price: Price::new(Decimal::new(3000, 2), CurrencyCode::USD),
                in_stock: true,
                force_out_of_stock: false,
                sold_out: false,
                options: vec![
                    SelectedOption::new("Size", size),
                    SelectedOption::new("Color", color),
                ],
            })
            .collect();

        Product::new(
            ProductId::new("gid://shopify/Product/tee"),
            "Tee",
            "tee",
            vec![
                ProductOption {
                    name: "Size".to_string(),
                    position: 1,
                    values: SIZES.iter().map(ToString::to_string).collect(),
                },
                ProductOption {
                    name: "Color".to_string(),
                    position: 2,
                    values: COLORS.iter().map(ToString::to_string).collect(),
                },
            ],
            variants,
        )
        .unwrap()
    }

    fn tee_with(edit: impl Fn(&mut Variant)) -> Product {
        let mut product = tee();
        product.variants.iter_mut().for_each(edit);
        product
    }

    #[test]
    fn test_every_variant_covers_every_option_once() {
        let product = tee();
        for variant in &product.variants {
            for option in &product.options {
                let count = variant
                    .options
                    .iter()
                    .filter(|o| o.name == option.name)
                    .count();
                assert_eq!(count, 1, "{} / {}", variant.id, option.name);
            }
        }
    }

    #[test]
    fn test_matching_ignores_option_order() {
        let product = tee();
        let forward = product.find_variant(&[
            SelectedOption::new("Size", "M"),
            SelectedOption::new("Color", "Red"),
        ]);
        let reversed = product.find_variant(&[
            SelectedOption::new("Color", "Red"),
            SelectedOption::new("Size", "M"),
        ]);
        assert_eq!(forward.map(|v| &v.id), Some(&variant_id("M", "Red")));
        assert_eq!(forward, reversed);
    }

    #[test]
    fn test_partial_selection_does_not_match() {
        let product = tee();
        assert!(product.find_variant(&[SelectedOption::new("Size", "M")]).is_none());
    }

    #[test]
    fn test_change_color_keeps_size() {
        let product = tee();
        let active = product.variant(&variant_id("M", "Red")).unwrap();
        let resolved = resolve_change(&product, active, &OptionChange::new("Color", "Blue"));
        assert_eq!(resolved.map(|v| &v.id), Some(&variant_id("M", "Blue")));
    }

    #[test]
    fn test_sold_out_combination_is_not_substituted() {
        let product = tee_with(|v| {
            if v.id == variant_id("L", "Blue") {
                v.in_stock = false;
            }
        });
        let active = product.variant(&variant_id("L", "Red")).unwrap();
        let change = OptionChange::new("Color", "Blue");

        assert!(!is_orderable(&product, active, &change, MatchMode::Strict));
        assert_eq!(availability(&product, active, &change), ValueAvailability::SoldOut);
        // The combination still exists; no other variant is picked instead.
        assert_eq!(
            resolve_change(&product, active, &change).map(|v| &v.id),
            Some(&variant_id("L", "Blue"))
        );
    }

    #[test]
    fn test_lenient_finds_value_in_other_combination() {
        let product = tee_with(|v| {
            if v.id == variant_id("L", "Blue") {
                v.force_out_of_stock = true;
            }
        });
        let active = product.variant(&variant_id("L", "Red")).unwrap();
        let change = OptionChange::new("Color", "Blue");

        assert!(!is_orderable(&product, active, &change, MatchMode::Strict));
        assert!(is_orderable(&product, active, &change, MatchMode::Lenient));
    }

    #[test]
    fn test_lenient_false_when_value_sold_out_everywhere() {
        let product = tee_with(|v| {
            if v.option_value("Color") == Some("Blue") {
                v.sold_out = true;
            }
        });
        let active = product.variant(&variant_id("S", "Red")).unwrap();
        assert!(!is_orderable(
            &product,
            active,
            &OptionChange::new("Color", "Blue"),
            MatchMode::Lenient
        ));
    }

    #[test]
    fn test_sparse_matrix_reports_unavailable() {
        let mut product = tee();
        product.variants.retain(|v| v.id != variant_id("S", "Blue"));
        let active = product.variant(&variant_id("S", "Red")).unwrap();
        let change = OptionChange::new("Color", "Blue");

        assert!(resolve_change(&product, active, &change).is_none());
        assert_eq!(
            availability(&product, active, &change),
            ValueAvailability::Unavailable
        );
    }

    #[test]
    fn test_selection_moves_active_variant() {
        let product = tee();
        let mut selection = ProductSelection::new(product, Some(&variant_id("M", "Red"))).unwrap();
        let next = selection.select(&OptionChange::new("Color", "Blue"));
        assert_eq!(next, Some(variant_id("M", "Blue")));
        assert_eq!(selection.active().id, variant_id("M", "Blue"));
    }

    #[test]
    fn test_selection_no_match_is_noop() {
        let mut product = tee();
        product.variants.retain(|v| v.id != variant_id("S", "Blue"));
        let mut selection = ProductSelection::new(product, Some(&variant_id("S", "Red"))).unwrap();
        assert_eq!(selection.select(&OptionChange::new("Color", "Blue")), None);
        assert_eq!(selection.active().id, variant_id("S", "Red"));
    }

    #[test]
    fn test_selection_falls_back_to_default_variant() {
        let selection = ProductSelection::new(tee(), Some(&VariantId::new("missing"))).unwrap();
        assert_eq!(selection.active().id, variant_id("S", "Red"));
    }

    #[test]
    fn test_option_states_mark_selected_and_sold_out() {
        let product = tee_with(|v| {
            if v.id == variant_id("M", "Blue") {
                v.in_stock = false;
            }
        });
        let selection = ProductSelection::new(product, Some(&variant_id("M", "Red"))).unwrap();
        let states = selection.option_states();
        let (_, colors) = states.iter().find(|(name, _)| name == "Color").unwrap();

        assert_eq!(colors.len(), 2);
        assert!(colors.iter().any(|s| s.value == "Red" && s.selected));
        let blue = colors.iter().find(|s| s.value == "Blue").unwrap();
        assert_eq!(blue.availability, ValueAvailability::SoldOut);
        assert!(blue.orderable_anywhere);
    }
}
