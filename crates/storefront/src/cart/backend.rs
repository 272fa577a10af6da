//! The commerce backend seen by the cart store.

use std::future::Future;

use julie_core::{CartId, LineId};

use crate::shopify::types::{AttributeInput, Cart, CartLineInput, CartLineUpdateInput};
use crate::shopify::{ShopifyError, StorefrontClient};

/// Cart line CRUD and checkout attribute updates.
///
/// Every call returns the backend's full cart after the mutation; the store
/// replaces its lines with that snapshot.
pub trait CartBackend: Send + Sync + 'static {
    fn create_cart(
        &self,
        lines: Vec<CartLineInput>,
    ) -> impl Future<Output = Result<Cart, ShopifyError>> + Send;

    fn get_cart(&self, cart_id: &CartId)
    -> impl Future<Output = Result<Cart, ShopifyError>> + Send;

    fn add_lines(
        &self,
        cart_id: &CartId,
        lines: Vec<CartLineInput>,
    ) -> impl Future<Output = Result<Cart, ShopifyError>> + Send;

    fn update_lines(
        &self,
        cart_id: &CartId,
        lines: Vec<CartLineUpdateInput>,
    ) -> impl Future<Output = Result<Cart, ShopifyError>> + Send;

    fn remove_lines(
        &self,
        cart_id: &CartId,
        line_ids: Vec<LineId>,
    ) -> impl Future<Output = Result<Cart, ShopifyError>> + Send;

    fn update_attributes(
        &self,
        cart_id: &CartId,
        attributes: Vec<AttributeInput>,
    ) -> impl Future<Output = Result<Cart, ShopifyError>> + Send;
}

impl CartBackend for StorefrontClient {
    async fn create_cart(&self, lines: Vec<CartLineInput>) -> Result<Cart, ShopifyError> {
        Self::create_cart(self, lines).await
    }

    async fn get_cart(&self, cart_id: &CartId) -> Result<Cart, ShopifyError> {
        Self::get_cart(self, cart_id).await
    }

    async fn add_lines(
        &self,
        cart_id: &CartId,
        lines: Vec<CartLineInput>,
    ) -> Result<Cart, ShopifyError> {
        self.add_to_cart(cart_id, lines).await
    }

    async fn update_lines(
        &self,
        cart_id: &CartId,
        lines: Vec<CartLineUpdateInput>,
    ) -> Result<Cart, ShopifyError> {
        self.update_cart(cart_id, lines).await
    }

    async fn remove_lines(
        &self,
        cart_id: &CartId,
        line_ids: Vec<LineId>,
    ) -> Result<Cart, ShopifyError> {
        self.remove_from_cart(cart_id, line_ids).await
    }

    async fn update_attributes(
        &self,
        cart_id: &CartId,
        attributes: Vec<AttributeInput>,
    ) -> Result<Cart, ShopifyError> {
        self.update_cart_attributes(cart_id, attributes).await
    }
}
