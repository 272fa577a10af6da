//! Conversions from raw GraphQL responses to domain types.

use julie_core::{
    CartId, LineId, Price, Product, ProductId, ProductOption, SelectedOption, Variant, VariantId,
};

use super::queries::{RawCart, RawMoney, RawProduct, RawVariant};
use crate::shopify::ShopifyError;
use crate::shopify::types::{Attribute, Cart, CartCost, CartLine, CartMerchandise, Money};

fn convert_money(money: RawMoney) -> Money {
    Money {
        amount: money.amount,
        currency_code: money.currency_code,
    }
}

pub fn convert_cart(cart: RawCart) -> Cart {
    Cart {
        id: CartId::new(cart.id),
        checkout_url: cart.checkout_url,
        total_quantity: cart.total_quantity,
        attributes: cart
            .attributes
            .into_iter()
            .map(|a| Attribute {
                key: a.key,
                value: a.value,
            })
            .collect(),
        cost: CartCost {
            subtotal: convert_money(cart.cost.subtotal_amount),
            total: convert_money(cart.cost.total_amount),
        },
        lines: cart
            .lines
            .nodes
            .into_iter()
            .map(|line| CartLine {
                id: LineId::new(line.id),
                quantity: line.quantity,
                amount_per_quantity: convert_money(line.cost.amount_per_quantity),
                total_amount: convert_money(line.cost.total_amount),
                merchandise: CartMerchandise {
                    id: VariantId::new(line.merchandise.id),
                    title: line.merchandise.title,
                    price: convert_money(line.merchandise.price),
                    image_url: line.merchandise.image.map(|i| i.url),
                    product_handle: line.merchandise.product.handle,
                    product_title: line.merchandise.product.title,
                },
            })
            .collect(),
    }
}

fn convert_variant(variant: RawVariant) -> Result<Variant, ShopifyError> {
    let price = Price::parse(&variant.price.amount, &variant.price.currency_code)
        .map_err(|e| ShopifyError::InvalidData(format!("variant {}: {e}", variant.id)))?;

    // Inventory exhausted and not sellable on backorder
    let sold_out = variant.quantity_available.is_some_and(|q| q <= 0)
        && !variant.currently_not_in_stock
        && !variant.available_for_sale;

    Ok(Variant {
        id: VariantId::new(variant.id),
        title: variant.title,
        price,
        in_stock: variant.available_for_sale,
        force_out_of_stock: variant
            .force_out_of_stock
            .is_some_and(|m| m.value.eq_ignore_ascii_case("true")),
        sold_out,
        options: variant
            .selected_options
            .into_iter()
            .map(|o| SelectedOption::new(o.name, o.value))
            .collect(),
    })
}

/// Convert and validate a product.
///
/// # Errors
///
/// Returns `ShopifyError::InvalidData` if a price cannot be parsed or the
/// variants do not cover the product options exactly once each.
pub fn convert_product(product: RawProduct) -> Result<Product, ShopifyError> {
    let options = product
        .options
        .into_iter()
        .zip(1_u32..)
        .map(|(option, position)| ProductOption {
            name: option.name,
            position,
            values: option.option_values.into_iter().map(|v| v.name).collect(),
        })
        .collect();

    let variants = product
        .variants
        .nodes
        .into_iter()
        .map(convert_variant)
        .collect::<Result<Vec<_>, _>>()?;

    let handle = product.handle;
    Product::new(
        ProductId::new(product.id),
        product.title,
        handle.clone(),
        options,
        variants,
    )
    .map_err(|e| ShopifyError::InvalidData(format!("product {handle}: {e}")))
}
