//! Integration test support for the Julie storefront.
//!
//! [`FakeBackend`] is an in-memory [`CartBackend`] so cart, checkout and
//! attribution flows run end to end without Shopify. It fails the way the
//! Storefront API does: a mutation on a dropped cart comes back as the
//! `cartId` user error Shopify sends.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p julie-integration-tests
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use julie_core::{CartId, LineId, VariantId};
use julie_storefront::cart::CartBackend;
use julie_storefront::shopify::ShopifyError;
use julie_storefront::shopify::types::{
    Attribute, AttributeInput, Cart, CartCost, CartLine, CartLineInput, CartLineUpdateInput,
    CartMerchandise, CartUserError, Money,
};

/// Unit price of every fake variant, in cents.
pub const UNIT_PRICE_CENTS: i64 = 2500;

/// Checkout host of the fake shop.
pub const SHOP_HOST: &str = "julie.myshopify.com";

#[derive(Default)]
struct FakeState {
    carts: HashMap<CartId, Cart>,
    next_id: u32,
    failure: Option<String>,
    attribute_failure: bool,
    attribute_updates: Vec<(CartId, Vec<AttributeInput>)>,
}

/// In-memory cart backend. Clones share the same carts.
#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

/// What the Storefront API returns for a mutation on a cart it has dropped.
fn missing_cart() -> ShopifyError {
    ShopifyError::from_user_errors(&[CartUserError {
        code: Some("INVALID".to_string()),
        field: Some(vec!["cartId".to_string()]),
        message: "The specified cart does not exist.".to_string(),
    }])
}

fn user_error(message: &str) -> ShopifyError {
    ShopifyError::from_user_errors(&[CartUserError {
        code: None,
        field: None,
        message: message.to_string(),
    }])
}

fn usd(cents: i64) -> Money {
    Money {
        amount: format!("{}.{:02}", cents / 100, cents % 100),
        currency_code: "USD".to_string(),
    }
}

fn line(id: LineId, variant_id: VariantId, quantity: i64) -> CartLine {
    CartLine {
        id,
        quantity,
        amount_per_quantity: usd(UNIT_PRICE_CENTS),
        total_amount: usd(UNIT_PRICE_CENTS * quantity),
        merchandise: CartMerchandise {
            id: variant_id,
            title: "M / Sand".to_string(),
            price: usd(UNIT_PRICE_CENTS),
            image_url: None,
            product_handle: "linen-shirt".to_string(),
            product_title: "Linen Shirt".to_string(),
        },
    }
}

fn recompute(cart: &mut Cart) {
    let quantity: i64 = cart.lines.iter().map(|l| l.quantity).sum();
    cart.total_quantity = quantity;
    cart.cost = CartCost {
        subtotal: usd(UNIT_PRICE_CENTS * quantity),
        total: usd(UNIT_PRICE_CENTS * quantity),
    };
}

impl FakeBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every following mutation with a user error.
    ///
    /// # Panics
    ///
    /// Panics if the state lock is poisoned.
    pub fn fail_with(&self, message: &str) {
        self.lock().failure = Some(message.to_string());
    }

    /// Accept mutations again.
    ///
    /// # Panics
    ///
    /// Panics if the state lock is poisoned.
    pub fn recover(&self) {
        self.lock().failure = None;
    }

    /// Reject `cartAttributesUpdate` only.
    ///
    /// # Panics
    ///
    /// Panics if the state lock is poisoned.
    pub fn fail_attributes(&self) {
        self.lock().attribute_failure = true;
    }

    /// Forget a cart, as Shopify does once a cart expires.
    ///
    /// # Panics
    ///
    /// Panics if the state lock is poisoned.
    pub fn expire(&self, cart_id: &CartId) {
        self.lock().carts.remove(cart_id);
    }

    /// Forget every cart, as after each one was checked out.
    ///
    /// # Panics
    ///
    /// Panics if the state lock is poisoned.
    pub fn expire_all(&self) {
        self.lock().carts.clear();
    }

    /// Every attribute update received, in order.
    ///
    /// # Panics
    ///
    /// Panics if the state lock is poisoned.
    #[must_use]
    pub fn attribute_updates(&self) -> Vec<(CartId, Vec<AttributeInput>)> {
        self.lock().attribute_updates.clone()
    }

    #[allow(clippy::unwrap_used)]
    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    fn mutate(
        &self,
        cart_id: &CartId,
        change: impl FnOnce(&mut FakeState, &CartId) -> Result<(), ShopifyError>,
    ) -> Result<Cart, ShopifyError> {
        let mut state = self.lock();
        if let Some(message) = &state.failure {
            return Err(user_error(message));
        }
        if !state.carts.contains_key(cart_id) {
            return Err(missing_cart());
        }
        change(&mut state, cart_id)?;
        let cart = state.carts.get_mut(cart_id).ok_or_else(missing_cart)?;
        recompute(cart);
        Ok(cart.clone())
    }
}

fn push_lines(state: &mut FakeState, cart_id: &CartId, lines: Vec<CartLineInput>) {
    for input in lines {
        state.next_id += 1;
        let line_id = LineId::new(format!("gid://shopify/CartLine/{}", state.next_id));
        if let Some(cart) = state.carts.get_mut(cart_id) {
            match cart
                .lines
                .iter_mut()
                .find(|l| l.merchandise.id == input.merchandise_id)
            {
                Some(existing) => {
                    existing.quantity += input.quantity;
                    existing.total_amount = usd(UNIT_PRICE_CENTS * existing.quantity);
                }
                None => cart
                    .lines
                    .push(line(line_id, input.merchandise_id, input.quantity)),
            }
        }
    }
}

impl CartBackend for FakeBackend {
    async fn create_cart(&self, lines: Vec<CartLineInput>) -> Result<Cart, ShopifyError> {
        let cart_id = {
            let mut state = self.lock();
            if let Some(message) = &state.failure {
                return Err(user_error(message));
            }
            state.next_id += 1;
            let token = state.next_id;
            let cart_id = CartId::new(format!("gid://shopify/Cart/c{token}"));
            state.carts.insert(
                cart_id.clone(),
                Cart {
                    id: cart_id.clone(),
                    checkout_url: format!("https://{SHOP_HOST}/cart/c/c{token}?key=k{token}"),
                    total_quantity: 0,
                    attributes: vec![],
                    cost: CartCost {
                        subtotal: usd(0),
                        total: usd(0),
                    },
                    lines: vec![],
                },
            );
            cart_id
        };
        self.add_lines(&cart_id, lines).await
    }

    async fn get_cart(&self, cart_id: &CartId) -> Result<Cart, ShopifyError> {
        self.lock()
            .carts
            .get(cart_id)
            .cloned()
            .ok_or_else(|| ShopifyError::NotFound(format!("Cart not found: {cart_id}")))
    }

    async fn add_lines(
        &self,
        cart_id: &CartId,
        lines: Vec<CartLineInput>,
    ) -> Result<Cart, ShopifyError> {
        self.mutate(cart_id, |state, id| {
            push_lines(state, id, lines);
            Ok(())
        })
    }

    async fn update_lines(
        &self,
        cart_id: &CartId,
        lines: Vec<CartLineUpdateInput>,
    ) -> Result<Cart, ShopifyError> {
        self.mutate(cart_id, |state, id| {
            let cart = state.carts.get_mut(id).ok_or_else(missing_cart)?;
            for input in lines {
                let existing = cart
                    .lines
                    .iter_mut()
                    .find(|l| l.id == input.id)
                    .ok_or_else(|| user_error("The merchandise line was not found"))?;
                existing.quantity = input.quantity;
                existing.total_amount = usd(UNIT_PRICE_CENTS * input.quantity);
            }
            cart.lines.retain(|l| l.quantity > 0);
            Ok(())
        })
    }

    async fn remove_lines(
        &self,
        cart_id: &CartId,
        line_ids: Vec<LineId>,
    ) -> Result<Cart, ShopifyError> {
        self.mutate(cart_id, |state, id| {
            if let Some(cart) = state.carts.get_mut(id) {
                cart.lines.retain(|l| !line_ids.contains(&l.id));
            }
            Ok(())
        })
    }

    async fn update_attributes(
        &self,
        cart_id: &CartId,
        attributes: Vec<AttributeInput>,
    ) -> Result<Cart, ShopifyError> {
        if self.lock().attribute_failure {
            return Err(ShopifyError::RateLimited(2));
        }
        self.mutate(cart_id, |state, id| {
            state
                .attribute_updates
                .push((id.clone(), attributes.clone()));
            if let Some(cart) = state.carts.get_mut(id) {
                cart.attributes = attributes
                    .into_iter()
                    .map(|a| Attribute {
                        key: a.key,
                        value: Some(a.value),
                    })
                    .collect();
            }
            Ok(())
        })
    }
}
