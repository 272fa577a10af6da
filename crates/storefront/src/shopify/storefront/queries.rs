//! GraphQL documents for the Shopify Storefront API.
//!
//! Each operation implements `graphql_client::GraphQLQuery` by hand so the
//! client can stay generic over `execute::<Q>()` without a schema-driven
//! derive. Response structs mirror only the fields the documents select.

use graphql_client::{GraphQLQuery, QueryBody};
use serde::{Deserialize, Serialize};

use crate::shopify::types::{AttributeInput, CartLineInput, CartLineUpdateInput, CartUserError};

/// Fields every cart query and mutation selects.
macro_rules! cart_fragment {
    () => {
        r"
fragment CartFields on Cart {
  id
  checkoutUrl
  totalQuantity
  attributes { key value }
  cost {
    subtotalAmount { amount currencyCode }
    totalAmount { amount currencyCode }
  }
  lines(first: 100) {
    nodes {
      id
      quantity
      cost {
        amountPerQuantity { amount currencyCode }
        totalAmount { amount currencyCode }
      }
      merchandise {
        ... on ProductVariant {
          id
          title
          price { amount currencyCode }
          image { url }
          product { handle title }
        }
      }
    }
  }
}
"
    };
}

/// Implement `GraphQLQuery` for a unit struct.
macro_rules! operation {
    ($name:ident, $vars:ty, $data:ty, $op:literal, $doc:expr) => {
        pub struct $name;

        impl GraphQLQuery for $name {
            type Variables = $vars;
            type ResponseData = $data;

            fn build_query(variables: Self::Variables) -> QueryBody<Self::Variables> {
                QueryBody {
                    variables,
                    query: $doc,
                    operation_name: $op,
                }
            }
        }
    };
}

// =============================================================================
// Products
// =============================================================================

operation!(
    GetProductByHandle,
    ProductByHandleVariables,
    ProductByHandleData,
    "GetProductByHandle",
    r#"
query GetProductByHandle($handle: String!) {
  product(handle: $handle) {
    id
    handle
    title
    options { name optionValues { name } }
    variants(first: 100) {
      nodes {
        id
        title
        availableForSale
        currentlyNotInStock
        quantityAvailable
        price { amount currencyCode }
        selectedOptions { name value }
        forceOutOfStock: metafield(namespace: "julie", key: "force_out_of_stock") { value }
      }
    }
  }
}
"#
);

#[derive(Debug, Clone, Serialize)]
pub struct ProductByHandleVariables {
    pub handle: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductByHandleData {
    pub product: Option<RawProduct>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawProduct {
    pub id: String,
    pub handle: String,
    pub title: String,
    pub options: Vec<RawProductOption>,
    pub variants: Nodes<RawVariant>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProductOption {
    pub name: String,
    pub option_values: Vec<RawOptionValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawOptionValue {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawVariant {
    pub id: String,
    pub title: String,
    pub available_for_sale: bool,
    #[serde(default)]
    pub currently_not_in_stock: bool,
    pub quantity_available: Option<i64>,
    pub price: RawMoney,
    pub selected_options: Vec<RawSelectedOption>,
    pub force_out_of_stock: Option<RawMetafield>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSelectedOption {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMetafield {
    pub value: String,
}

// =============================================================================
// Carts
// =============================================================================

operation!(
    GetCart,
    CartIdVariables,
    GetCartData,
    "GetCart",
    concat!(
        "query GetCart($cartId: ID!) { cart(id: $cartId) { ...CartFields } }",
        cart_fragment!()
    )
);

operation!(
    CreateCart,
    CreateCartVariables,
    CreateCartData,
    "CreateCart",
    concat!(
        "mutation CreateCart($input: CartInput!) ",
        "{ cartCreate(input: $input) { cart { ...CartFields } ",
        "userErrors { code field message } } }",
        cart_fragment!()
    )
);

operation!(
    AddToCart,
    AddToCartVariables,
    AddToCartData,
    "AddToCart",
    concat!(
        "mutation AddToCart($cartId: ID!, $lines: [CartLineInput!]!) ",
        "{ cartLinesAdd(cartId: $cartId, lines: $lines) { cart { ...CartFields } ",
        "userErrors { code field message } } }",
        cart_fragment!()
    )
);

operation!(
    UpdateCartLines,
    UpdateCartLinesVariables,
    UpdateCartLinesData,
    "UpdateCartLines",
    concat!(
        "mutation UpdateCartLines($cartId: ID!, $lines: [CartLineUpdateInput!]!) ",
        "{ cartLinesUpdate(cartId: $cartId, lines: $lines) { cart { ...CartFields } ",
        "userErrors { code field message } } }",
        cart_fragment!()
    )
);

operation!(
    RemoveFromCart,
    RemoveFromCartVariables,
    RemoveFromCartData,
    "RemoveFromCart",
    concat!(
        "mutation RemoveFromCart($cartId: ID!, $lineIds: [ID!]!) ",
        "{ cartLinesRemove(cartId: $cartId, lineIds: $lineIds) { cart { ...CartFields } ",
        "userErrors { code field message } } }",
        cart_fragment!()
    )
);

operation!(
    UpdateCartAttributes,
    UpdateCartAttributesVariables,
    UpdateCartAttributesData,
    "UpdateCartAttributes",
    concat!(
        "mutation UpdateCartAttributes($cartId: ID!, $attributes: [AttributeInput!]!) ",
        "{ cartAttributesUpdate(cartId: $cartId, attributes: $attributes) ",
        "{ cart { ...CartFields } ",
        "userErrors { code field message } } }",
        cart_fragment!()
    )
);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartIdVariables {
    pub cart_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateCartVariables {
    pub input: CartInput,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartInput {
    pub lines: Vec<CartLineInput>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartVariables {
    pub cart_id: String,
    pub lines: Vec<CartLineInput>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartLinesVariables {
    pub cart_id: String,
    pub lines: Vec<CartLineUpdateInput>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFromCartVariables {
    pub cart_id: String,
    pub line_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartAttributesVariables {
    pub cart_id: String,
    pub attributes: Vec<AttributeInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetCartData {
    pub cart: Option<RawCart>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCartData {
    pub cart_create: Option<CartPayload>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartData {
    pub cart_lines_add: Option<CartPayload>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartLinesData {
    pub cart_lines_update: Option<CartPayload>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFromCartData {
    pub cart_lines_remove: Option<CartPayload>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartAttributesData {
    pub cart_attributes_update: Option<CartPayload>,
}

/// Shared payload of every cart mutation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartPayload {
    pub cart: Option<RawCart>,
    #[serde(default)]
    pub user_errors: Vec<CartUserError>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCart {
    pub id: String,
    pub checkout_url: String,
    pub total_quantity: i64,
    #[serde(default)]
    pub attributes: Vec<RawAttribute>,
    pub cost: RawCartCost,
    pub lines: Nodes<RawCartLine>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAttribute {
    pub key: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCartCost {
    pub subtotal_amount: RawMoney,
    pub total_amount: RawMoney,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCartLine {
    pub id: String,
    pub quantity: i64,
    pub cost: RawLineCost,
    pub merchandise: RawMerchandise,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLineCost {
    pub amount_per_quantity: RawMoney,
    pub total_amount: RawMoney,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMerchandise {
    pub id: String,
    pub title: String,
    pub price: RawMoney,
    pub image: Option<RawImage>,
    pub product: RawMerchandiseProduct,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawImage {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMerchandiseProduct {
    pub handle: String,
    pub title: String,
}

// =============================================================================
// Shared
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMoney {
    pub amount: String,
    pub currency_code: String,
}

/// A connection selected through `nodes`.
#[derive(Debug, Clone, Deserialize)]
pub struct Nodes<T> {
    pub nodes: Vec<T>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use julie_core::VariantId;

    #[test]
    fn test_query_body_names_operation_and_includes_fragment() {
        let body = AddToCart::build_query(AddToCartVariables {
            cart_id: "gid://shopify/Cart/1".to_string(),
            lines: vec![CartLineInput::new(&VariantId::new("gid://shopify/ProductVariant/9"), 2)],
        });
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["operationName"], "AddToCart");
        assert!(json["query"].as_str().unwrap().contains("fragment CartFields on Cart"));
        assert_eq!(json["variables"]["cartId"], "gid://shopify/Cart/1");
        assert_eq!(
            json["variables"]["lines"][0]["merchandiseId"],
            "gid://shopify/ProductVariant/9"
        );
        assert_eq!(json["variables"]["lines"][0]["quantity"], 2);
    }

    #[test]
    fn test_mutation_payload_parses_user_errors() {
        let data: AddToCartData = serde_json::from_value(serde_json::json!({
            "cartLinesAdd": {
                "cart": null,
                "userErrors": [{
                    "code": "INVALID",
                    "field": ["lines", "0"],
                    "message": "Variant is sold out"
                }]
            }
        }))
        .unwrap();
        let payload = data.cart_lines_add.unwrap();
        assert!(payload.cart.is_none());
        assert_eq!(payload.user_errors[0].message, "Variant is sold out");
    }
}
