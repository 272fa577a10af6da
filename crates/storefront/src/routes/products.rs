//! Product route handlers.
//!
//! A product view is always relative to one active variant: the option
//! value states tell the client which buttons are selectable.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use julie_core::variant::{OptionChange, OptionValueState, ProductSelection};
use julie_core::{SelectedOption, Variant, VariantId};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::cart::CartBackend;
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Variant display data.
#[derive(Debug, Clone, Serialize)]
pub struct VariantView {
    pub id: VariantId,
    pub title: String,
    pub price: String,
    pub orderable: bool,
    pub sold_out: bool,
    pub options: Vec<SelectedOption>,
}

impl From<&Variant> for VariantView {
    fn from(variant: &Variant) -> Self {
        Self {
            id: variant.id.clone(),
            title: variant.title.clone(),
            price: variant.price.to_string(),
            orderable: variant.is_orderable(),
            sold_out: variant.sold_out,
            options: variant.options.clone(),
        }
    }
}

/// One option with the state of each of its values.
#[derive(Debug, Clone, Serialize)]
pub struct OptionView {
    pub name: String,
    pub values: Vec<OptionValueState>,
}

/// Product detail data.
#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    pub handle: String,
    pub title: String,
    pub active_variant: VariantView,
    pub options: Vec<OptionView>,
    pub variants: Vec<VariantView>,
}

impl From<&ProductSelection> for ProductView {
    fn from(selection: &ProductSelection) -> Self {
        let product = selection.product();
        Self {
            handle: product.slug.clone(),
            title: product.title.clone(),
            active_variant: VariantView::from(selection.active()),
            options: selection
                .option_states()
                .into_iter()
                .map(|(name, values)| OptionView { name, values })
                .collect(),
            variants: product.variants.iter().map(VariantView::from).collect(),
        }
    }
}

/// Active variant query parameter.
#[derive(Debug, Deserialize)]
pub struct VariantQuery {
    pub variant: Option<VariantId>,
}

/// Option change request.
#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    /// Currently active variant; the default variant when absent.
    pub variant_id: Option<VariantId>,
    pub option: String,
    pub value: String,
}

/// Result of an option change.
#[derive(Debug, Serialize)]
pub struct SelectResponse {
    /// False when no variant exists for the combination; the active variant
    /// is then unchanged.
    pub changed: bool,
    pub product: ProductView,
}

async fn load_selection<B: CartBackend + Clone>(
    state: &AppState<B>,
    handle: &str,
    variant: Option<&VariantId>,
) -> Result<ProductSelection> {
    let product = state.storefront().get_product_by_handle(handle).await?;
    ProductSelection::new(product, variant)
        .ok_or_else(|| AppError::NotFound(format!("product {handle} has no variants")))
}

/// Display product detail.
#[instrument(skip(state))]
pub async fn show<B: CartBackend + Clone>(
    State(state): State<AppState<B>>,
    Path(handle): Path<String>,
    Query(query): Query<VariantQuery>,
) -> Result<Json<ProductView>> {
    let selection = load_selection(&state, &handle, query.variant.as_ref()).await?;
    Ok(Json(ProductView::from(&selection)))
}

/// Resolve an option change against the active variant.
#[instrument(skip(state, request), fields(option = %request.option, value = %request.value))]
pub async fn select<B: CartBackend + Clone>(
    State(state): State<AppState<B>>,
    Path(handle): Path<String>,
    Json(request): Json<SelectRequest>,
) -> Result<Json<SelectResponse>> {
    let mut selection = load_selection(&state, &handle, request.variant_id.as_ref()).await?;

    if selection.product().option(&request.option).is_none() {
        return Err(AppError::BadRequest(format!(
            "unknown option {}",
            request.option
        )));
    }

    let changed = selection
        .select(&OptionChange::new(request.option, request.value))
        .is_some();

    Ok(Json(SelectResponse {
        changed,
        product: ProductView::from(&selection),
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use julie_core::{Price, Product, ProductId, ProductOption};

    use super::*;

    fn variant(id: &str, size: &str, in_stock: bool) -> Variant {
        Variant {
            id: VariantId::new(id),
            title: size.to_string(),
            price: Price::parse("48.00", "USD").unwrap(),
            in_stock,
            force_out_of_stock: false,
            sold_out: !in_stock,
            options: vec![SelectedOption::new("Size", size)],
        }
    }

    #[test]
    fn test_product_view_reports_value_states() {
        let product = Product::new(
            ProductId::new("p1"),
            "Linen Shirt".to_string(),
            "linen-shirt".to_string(),
            vec![ProductOption {
                name: "Size".to_string(),
                position: 1,
                values: vec!["S".to_string(), "M".to_string()],
            }],
            vec![variant("v1", "S", true), variant("v2", "M", false)],
        )
        .unwrap();
        let selection = ProductSelection::new(product, None).unwrap();
        let view = ProductView::from(&selection);

        assert_eq!(view.active_variant.id.as_str(), "v1");
        assert_eq!(view.active_variant.price, "$48.00");
        let sizes = &view.options[0];
        assert!(sizes.values[0].selected);
        assert!(!sizes.values[1].orderable_anywhere);
        assert!(view.variants[1].sold_out);
    }
}
