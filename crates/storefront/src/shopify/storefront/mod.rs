//! Shopify Storefront API client implementation.
//!
//! Uses hand-written `graphql_client` operations with `reqwest` 0.13 for HTTP.
//! Caches products using `moka` (5-minute TTL).

mod cache;
mod conversions;
pub mod queries;

use std::sync::Arc;
use std::time::Duration;

use graphql_client::{GraphQLQuery, Response};
use julie_core::{CartId, LineId, Product};
use moka::future::Cache;
use secrecy::ExposeSecret;
use tracing::{debug, instrument};

use crate::config::ShopifyStorefrontConfig;
use crate::shopify::types::{AttributeInput, Cart, CartLineInput, CartLineUpdateInput};
use crate::shopify::{GraphQLError, GraphQLErrorLocation, ShopifyError};

use cache::{CacheKey, CacheValue};
use conversions::{convert_cart, convert_product};
use queries::{
    AddToCart, AddToCartVariables, CartIdVariables, CartInput, CartPayload, CreateCart,
    CreateCartVariables, GetCart, GetProductByHandle, ProductByHandleVariables, RemoveFromCart,
    RemoveFromCartVariables, UpdateCartAttributes, UpdateCartAttributesVariables,
    UpdateCartLines, UpdateCartLinesVariables,
};

/// Longest slice of a response body included in logs.
const LOG_BODY_LIMIT: usize = 500;

// =============================================================================
// StorefrontClient
// =============================================================================

/// Client for the Shopify Storefront API.
///
/// Provides type-safe access to products and cart operations.
/// Products are cached for 5 minutes.
#[derive(Clone)]
pub struct StorefrontClient {
    inner: Arc<StorefrontClientInner>,
}

struct StorefrontClientInner {
    client: reqwest::Client,
    endpoint: String,
    access_token: String,
    cache: Cache<CacheKey, CacheValue>,
}

impl StorefrontClient {
    /// Create a new Storefront API client.
    #[must_use]
    pub fn new(config: &ShopifyStorefrontConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        let endpoint = format!(
            "https://{}/api/{}/graphql.json",
            config.store, config.api_version
        );

        Self {
            inner: Arc::new(StorefrontClientInner {
                client: reqwest::Client::new(),
                endpoint,
                access_token: config.storefront_private_token.expose_secret().to_string(),
                cache,
            }),
        }
    }

    /// Execute a GraphQL operation.
    async fn execute<Q: GraphQLQuery>(
        &self,
        variables: Q::Variables,
    ) -> Result<Q::ResponseData, ShopifyError> {
        let request_body = Q::build_query(variables);

        let response = self
            .inner
            .client
            .post(&self.inner.endpoint)
            // Private access tokens use a different header than public tokens
            .header(
                "Shopify-Storefront-Private-Token",
                &self.inner.access_token,
            )
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ShopifyError::RateLimited(retry_after));
        }

        // Body as text first for better error diagnostics
        let response_text = response.text().await?;
        let body_preview = || response_text.chars().take(LOG_BODY_LIMIT).collect::<String>();

        if !status.is_success() {
            tracing::error!(
                status = %status,
                operation = request_body.operation_name,
                body = %body_preview(),
                "Shopify API returned non-success status"
            );
            return Err(ShopifyError::message(format!(
                "HTTP {status}: {}",
                response_text.chars().take(200).collect::<String>()
            )));
        }

        let response: Response<Q::ResponseData> = serde_json::from_str(&response_text)
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    operation = request_body.operation_name,
                    body = %body_preview(),
                    "Failed to parse Shopify GraphQL response"
                );
                ShopifyError::Parse(e)
            })?;

        if let Some(errors) = response.errors
            && !errors.is_empty()
        {
            debug!(errors = ?errors, "GraphQL errors in response");
            return Err(ShopifyError::GraphQL(
                errors.into_iter().map(convert_graphql_error).collect(),
            ));
        }

        response.data.ok_or_else(|| {
            tracing::error!(
                operation = request_body.operation_name,
                body = %body_preview(),
                "Shopify GraphQL response has no data and no errors"
            );
            ShopifyError::message("No data in response")
        })
    }

    // =========================================================================
    // Product Methods
    // =========================================================================

    /// Get a product by its handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not found, fails option coverage
    /// validation, or the API request fails.
    #[instrument(skip(self), fields(handle = %handle))]
    pub async fn get_product_by_handle(&self, handle: &str) -> Result<Product, ShopifyError> {
        let cache_key = CacheKey::Product(handle.to_string());

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let data = self
            .execute::<GetProductByHandle>(ProductByHandleVariables {
                handle: handle.to_string(),
            })
            .await?;

        let raw = data
            .product
            .ok_or_else(|| ShopifyError::NotFound(format!("Product not found: {handle}")))?;
        let product = convert_product(raw)?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    // =========================================================================
    // Cart Methods (not cached - mutable state)
    // =========================================================================

    /// Create a new cart with the given lines.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart creation fails or user errors are returned.
    #[instrument(skip(self, lines), fields(line_count = lines.len()))]
    pub async fn create_cart(&self, lines: Vec<CartLineInput>) -> Result<Cart, ShopifyError> {
        let data = self
            .execute::<CreateCart>(CreateCartVariables {
                input: CartInput { lines },
            })
            .await?;
        cart_from_payload(data.cart_create, "Failed to create cart")
    }

    /// Get an existing cart.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::NotFound` if Shopify no longer knows the cart
    /// (expired or completed), or an error if the API request fails.
    #[instrument(skip(self), fields(cart_id = %cart_id))]
    pub async fn get_cart(&self, cart_id: &CartId) -> Result<Cart, ShopifyError> {
        let data = self
            .execute::<GetCart>(CartIdVariables {
                cart_id: cart_id.to_string(),
            })
            .await?;

        data.cart
            .map(convert_cart)
            .ok_or_else(|| ShopifyError::NotFound(format!("Cart not found: {cart_id}")))
    }

    /// Add lines to a cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart update fails or user errors are returned.
    #[instrument(skip(self, lines), fields(cart_id = %cart_id))]
    pub async fn add_to_cart(
        &self,
        cart_id: &CartId,
        lines: Vec<CartLineInput>,
    ) -> Result<Cart, ShopifyError> {
        let data = self
            .execute::<AddToCart>(AddToCartVariables {
                cart_id: cart_id.to_string(),
                lines,
            })
            .await?;
        cart_from_payload(data.cart_lines_add, "Failed to add to cart")
    }

    /// Update cart line quantities.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart update fails or user errors are returned.
    #[instrument(skip(self, lines), fields(cart_id = %cart_id))]
    pub async fn update_cart(
        &self,
        cart_id: &CartId,
        lines: Vec<CartLineUpdateInput>,
    ) -> Result<Cart, ShopifyError> {
        let data = self
            .execute::<UpdateCartLines>(UpdateCartLinesVariables {
                cart_id: cart_id.to_string(),
                lines,
            })
            .await?;
        cart_from_payload(data.cart_lines_update, "Failed to update cart")
    }

    /// Remove lines from a cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart update fails or user errors are returned.
    #[instrument(skip(self, line_ids), fields(cart_id = %cart_id))]
    pub async fn remove_from_cart(
        &self,
        cart_id: &CartId,
        line_ids: Vec<LineId>,
    ) -> Result<Cart, ShopifyError> {
        let data = self
            .execute::<RemoveFromCart>(RemoveFromCartVariables {
                cart_id: cart_id.to_string(),
                line_ids: line_ids.into_iter().map(LineId::into_inner).collect(),
            })
            .await?;
        cart_from_payload(data.cart_lines_remove, "Failed to remove from cart")
    }

    /// Replace the cart's custom attributes.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart update fails or user errors are returned.
    #[instrument(skip(self, attributes), fields(cart_id = %cart_id))]
    pub async fn update_cart_attributes(
        &self,
        cart_id: &CartId,
        attributes: Vec<AttributeInput>,
    ) -> Result<Cart, ShopifyError> {
        let data = self
            .execute::<UpdateCartAttributes>(UpdateCartAttributesVariables {
                cart_id: cart_id.to_string(),
                attributes,
            })
            .await?;
        cart_from_payload(data.cart_attributes_update, "Failed to update cart attributes")
    }
}

/// Unwrap a cart mutation payload, surfacing user errors first.
///
/// A mutation on a cart Shopify has dropped comes back as a `cartId` user
/// error with no cart, and maps to `ShopifyError::NotFound`.
fn cart_from_payload(payload: Option<CartPayload>, failure: &str) -> Result<Cart, ShopifyError> {
    if let Some(result) = payload {
        if !result.user_errors.is_empty() {
            return Err(ShopifyError::from_user_errors(&result.user_errors));
        }

        if let Some(cart) = result.cart {
            return Ok(convert_cart(cart));
        }
    }

    Err(ShopifyError::message(failure))
}

fn convert_graphql_error(e: graphql_client::Error) -> GraphQLError {
    GraphQLError {
        message: e.message,
        locations: e.locations.map_or_else(Vec::new, |locs| {
            locs.into_iter()
                .map(|l| GraphQLErrorLocation {
                    line: i64::from(l.line),
                    column: i64::from(l.column),
                })
                .collect()
        }),
        path: e.path.map_or_else(Vec::new, |p| {
            p.into_iter()
                .map(|fragment| match fragment {
                    graphql_client::PathFragment::Key(s) => serde_json::Value::String(s),
                    graphql_client::PathFragment::Index(i) => serde_json::Value::Number(i.into()),
                })
                .collect()
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::shopify::types::CartUserError;

    fn raw_cart() -> queries::RawCart {
        serde_json::from_value(serde_json::json!({
            "id": "gid://shopify/Cart/c1",
            "checkoutUrl": "https://julie.myshopify.com/cart/c/c1",
            "totalQuantity": 0,
            "attributes": [],
            "cost": {
                "subtotalAmount": { "amount": "0.0", "currencyCode": "USD" },
                "totalAmount": { "amount": "0.0", "currencyCode": "USD" }
            },
            "lines": { "nodes": [] }
        }))
        .unwrap()
    }

    #[test]
    fn test_cart_from_payload_prefers_user_errors() {
        let payload = CartPayload {
            cart: Some(raw_cart()),
            user_errors: vec![CartUserError {
                code: None,
                field: None,
                message: "Merchandise is sold out".to_string(),
            }],
        };
        let err = cart_from_payload(Some(payload), "Failed").unwrap_err();
        assert!(matches!(err, ShopifyError::UserError(msg) if msg == "Merchandise is sold out"));
    }

    #[test]
    fn test_cart_from_payload_converts_cart() {
        let payload = CartPayload {
            cart: Some(raw_cart()),
            user_errors: vec![],
        };
        let cart = cart_from_payload(Some(payload), "Failed").unwrap();
        assert_eq!(cart.id.as_str(), "gid://shopify/Cart/c1");
        assert!(cart.lines.is_empty());
    }

    #[test]
    fn test_cart_from_payload_for_dropped_cart_is_not_found() {
        let payload = CartPayload {
            cart: None,
            user_errors: vec![CartUserError {
                code: Some("INVALID".to_string()),
                field: Some(vec!["cartId".to_string()]),
                message: "The specified cart does not exist.".to_string(),
            }],
        };
        let err = cart_from_payload(Some(payload), "Failed to add to cart").unwrap_err();
        assert!(matches!(err, ShopifyError::NotFound(_)));
    }

    #[test]
    fn test_cart_from_missing_payload_is_error() {
        let err = cart_from_payload(None, "Failed to create cart").unwrap_err();
        assert_eq!(err.to_string(), "GraphQL errors: Failed to create cart");
    }
}
