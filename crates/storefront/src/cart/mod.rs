//! Cart state store.
//!
//! A [`CartStore`] is the single source of truth for one visitor's cart. It
//! owns a [`CartState`] inside a `tokio::sync::watch` channel: mutations go
//! through the store's methods and observers call [`CartStore::subscribe`].
//!
//! # Mutation policy
//!
//! Every backend mutation is confirmed-only. Lines change locally only after
//! the backend returns its new cart; on failure the previous lines stay and
//! a dismissible [`CartNotice`] is set. Nothing is retried.
//!
//! Adds run one at a time per store, so concurrent first adds share the one
//! backend cart the first of them creates. A cart the backend reports as gone
//! is cleared locally; an add to it starts a new cart instead.

pub mod backend;
pub mod drawer;

use std::collections::BTreeSet;
use std::sync::Arc;

use julie_core::{CartId, LineId, VariantId};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tracing::{debug, instrument, warn};

use crate::shopify::ShopifyError;
use crate::shopify::types::{Cart, CartLine, CartLineInput, CartLineUpdateInput, Money};

pub use backend::CartBackend;
pub use drawer::{DrawerEvent, DrawerState, Key};

/// Title Shopify gives the only variant of a product without options.
const DEFAULT_VARIANT_TITLE: &str = "Default Title";

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("quantity must be at least 1")]
    InvalidQuantity,
    #[error("the cart is empty")]
    NoCart,
    #[error("line {0} is not in the cart")]
    UnknownLine(LineId),
    #[error("line {0} already has a change in progress")]
    LineBusy(LineId),
    #[error(transparent)]
    Backend(#[from] ShopifyError),
}

/// A transient, user-visible message about a failed cart action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartNotice {
    pub message: String,
}

impl CartNotice {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One cart line with the display data needed to render it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineItem {
    pub id: LineId,
    pub variant_id: VariantId,
    pub quantity: u32,
    pub product_title: String,
    pub product_handle: String,
    pub variant_title: Option<String>,
    pub image_url: Option<String>,
    pub unit_price: Money,
    pub line_total: Money,
}

impl LineItem {
    /// Convert a backend line; lines without a positive quantity are dropped.
    fn from_cart_line(line: CartLine) -> Option<Self> {
        let quantity = u32::try_from(line.quantity).ok().filter(|q| *q > 0)?;
        let variant_title =
            Some(line.merchandise.title).filter(|title| title != DEFAULT_VARIANT_TITLE);

        Some(Self {
            id: line.id,
            variant_id: line.merchandise.id,
            quantity,
            product_title: line.merchandise.product_title,
            product_handle: line.merchandise.product_handle,
            variant_title,
            image_url: line.merchandise.image_url,
            unit_price: line.amount_per_quantity,
            line_total: line.total_amount,
        })
    }
}

/// Everything the cart UI renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartState {
    pub cart_id: Option<CartId>,
    pub checkout_url: Option<String>,
    pub lines: Vec<LineItem>,
    pub total_quantity: u32,
    pub subtotal: Option<Money>,
    /// Adds waiting for or awaiting the backend.
    adds_pending: u32,
    /// Lines with a backend round-trip in flight.
    pub updating: BTreeSet<LineId>,
    pub drawer: DrawerState,
    pub notice: Option<CartNotice>,
}

impl CartState {
    #[must_use]
    pub const fn is_adding(&self) -> bool {
        self.adds_pending > 0
    }

    #[must_use]
    pub fn is_updating(&self) -> bool {
        !self.updating.is_empty()
    }

    #[must_use]
    pub fn is_line_updating(&self, line_id: &LineId) -> bool {
        self.updating.contains(line_id)
    }

    #[must_use]
    pub const fn is_cart_open(&self) -> bool {
        self.drawer.is_open()
    }

    #[must_use]
    pub fn line(&self, line_id: &LineId) -> Option<&LineItem> {
        self.lines.iter().find(|l| &l.id == line_id)
    }

    /// Replace cart data with the backend's confirmed cart.
    fn apply_cart(&mut self, cart: Cart) {
        self.total_quantity = u32::try_from(cart.total_quantity).unwrap_or(0);
        self.subtotal = Some(cart.cost.subtotal);
        self.checkout_url = Some(cart.checkout_url);
        self.cart_id = Some(cart.id);
        self.lines = cart
            .lines
            .into_iter()
            .filter_map(LineItem::from_cart_line)
            .collect();
    }

    /// Forget `cart_id` after the backend reported it gone, unless the store
    /// has already moved on to another cart.
    fn clear_if_current(&mut self, cart_id: &CartId) {
        if self.cart_id.as_ref().is_none_or(|current| current == cart_id) {
            self.clear_cart();
        }
    }

    /// Forget a cart the backend has cleared.
    fn clear_cart(&mut self) {
        self.cart_id = None;
        self.checkout_url = None;
        self.lines.clear();
        self.total_quantity = 0;
        self.subtotal = None;
        self.updating.clear();
    }

    /// Mark a line as in flight, rejecting unknown or already busy lines.
    fn claim_line(&mut self, line_id: &LineId) -> Result<CartId, CartError> {
        let cart_id = self.cart_id.clone().ok_or(CartError::NoCart)?;
        if self.line(line_id).is_none() {
            return Err(CartError::UnknownLine(line_id.clone()));
        }
        if !self.updating.insert(line_id.clone()) {
            return Err(CartError::LineBusy(line_id.clone()));
        }
        self.notice = None;
        Ok(cart_id)
    }
}

/// Controller owning one visitor's cart state.
///
/// Cheap to clone; clones share the same state.
pub struct CartStore<B> {
    inner: Arc<CartStoreInner<B>>,
}

struct CartStoreInner<B> {
    backend: B,
    state: watch::Sender<CartState>,
    /// Held for the whole backend round trip of an add.
    add_turn: Mutex<()>,
}

/// Counts one add as pending until dropped, including when the caller's
/// future is cancelled.
struct PendingAdd<'a>(&'a watch::Sender<CartState>);

impl<'a> PendingAdd<'a> {
    fn start(state: &'a watch::Sender<CartState>) -> Self {
        state.send_modify(|s| {
            s.adds_pending += 1;
            s.notice = None;
        });
        Self(state)
    }
}

impl Drop for PendingAdd<'_> {
    fn drop(&mut self) {
        self.0
            .send_modify(|s| s.adds_pending = s.adds_pending.saturating_sub(1));
    }
}

impl<B> Clone for CartStore<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: CartBackend> CartStore<B> {
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self {
            inner: Arc::new(CartStoreInner {
                backend,
                state: watch::Sender::new(CartState::default()),
                add_turn: Mutex::new(()),
            }),
        }
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> CartState {
        self.inner.state.borrow().clone()
    }

    /// Receive every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.inner.state.subscribe()
    }

    /// Load an existing backend cart into the store.
    ///
    /// A cart the backend no longer knows is cleared locally without a
    /// notice.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Backend` for failures other than not found.
    #[instrument(skip(self), fields(cart_id = %cart_id))]
    pub async fn restore(&self, cart_id: &CartId) -> Result<(), CartError> {
        match self.inner.backend.get_cart(cart_id).await {
            Ok(cart) => {
                self.inner.state.send_modify(|s| s.apply_cart(cart));
                Ok(())
            }
            Err(ShopifyError::NotFound(_)) => {
                debug!("Backend cart is gone, clearing local cart");
                self.inner.state.send_modify(|s| s.clear_if_current(cart_id));
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to restore cart");
                Err(e.into())
            }
        }
    }

    /// Reload the current cart from the backend, clearing it if the backend
    /// no longer knows it. A store without a cart is left alone.
    ///
    /// # Errors
    ///
    /// Same as [`CartStore::restore`].
    pub async fn refresh(&self) -> Result<(), CartError> {
        let current = self.inner.state.borrow().cart_id.clone();
        match current {
            Some(cart_id) => self.restore(&cart_id).await,
            None => Ok(()),
        }
    }

    /// Add a variant to the cart, creating the backend cart on first use or
    /// when the backend has dropped the current one.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for a zero quantity, or
    /// `CartError::Backend` if the backend rejected the change (the notice is
    /// set and the lines are unchanged).
    #[instrument(skip(self), fields(variant_id = %variant_id))]
    pub async fn add_item(&self, variant_id: &VariantId, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        let _pending = PendingAdd::start(&self.inner.state);
        let _turn = self.inner.add_turn.lock().await;
        let cart_id = self.inner.state.borrow().cart_id.clone();

        let line = CartLineInput::new(variant_id, quantity);
        let result = match &cart_id {
            Some(id) => match self.inner.backend.add_lines(id, vec![line.clone()]).await {
                Err(ShopifyError::NotFound(_)) => {
                    debug!(cart_id = %id, "Backend cart is gone, starting a new one");
                    self.inner.backend.create_cart(vec![line]).await
                }
                other => other,
            },
            None => self.inner.backend.create_cart(vec![line]).await,
        };

        self.settle(
            cart_id.as_ref(),
            result,
            "Could not add the item to your cart.",
            |_| {},
        )
    }

    /// Change a line's quantity; zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineBusy` while another change to the same line is
    /// in flight, `CartError::UnknownLine`/`CartError::NoCart` for lines not
    /// in the cart, or `CartError::Backend` if the backend rejected it.
    #[instrument(skip(self), fields(line_id = %line_id))]
    pub async fn update_item(&self, line_id: &LineId, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return self.remove_item(line_id).await;
        }

        let cart_id = self.claim_line(line_id)?;
        let result = self
            .inner
            .backend
            .update_lines(&cart_id, vec![CartLineUpdateInput::new(line_id, quantity)])
            .await;

        self.settle(Some(&cart_id), result, "Could not update the quantity.", |s| {
            s.updating.remove(line_id);
        })
    }

    /// Remove a line once the backend confirms.
    ///
    /// # Errors
    ///
    /// Same as [`CartStore::update_item`].
    #[instrument(skip(self), fields(line_id = %line_id))]
    pub async fn remove_item(&self, line_id: &LineId) -> Result<(), CartError> {
        let cart_id = self.claim_line(line_id)?;
        let result = self
            .inner
            .backend
            .remove_lines(&cart_id, vec![line_id.clone()])
            .await;

        self.settle(Some(&cart_id), result, "Could not remove the item.", |s| {
            s.updating.remove(line_id);
        })
    }

    /// Open or close the drawer. UI state only.
    pub fn toggle_cart(&self, open: bool) -> DrawerState {
        self.dispatch(DrawerEvent::Toggle { open })
    }

    /// Feed a drawer event through the state machine.
    pub fn dispatch(&self, event: DrawerEvent) -> DrawerState {
        let mut next = DrawerState::Closed;
        self.inner.state.send_if_modified(|s| {
            next = s.drawer.apply(event);
            let changed = next != s.drawer;
            s.drawer = next;
            changed
        });
        next
    }

    pub fn dismiss_notice(&self) {
        self.inner
            .state
            .send_if_modified(|s| s.notice.take().is_some());
    }

    fn claim_line(&self, line_id: &LineId) -> Result<CartId, CartError> {
        let mut claimed = Err(CartError::NoCart);
        self.inner.state.send_if_modified(|s| {
            claimed = s.claim_line(line_id);
            claimed.is_ok()
        });
        claimed
    }

    /// Apply a mutation result and release its busy flag in one update.
    fn settle(
        &self,
        target: Option<&CartId>,
        result: Result<Cart, ShopifyError>,
        failure: &str,
        release: impl FnOnce(&mut CartState),
    ) -> Result<(), CartError> {
        let mut outcome = Ok(());
        self.inner.state.send_modify(|s| {
            release(s);
            match result {
                Ok(cart) => s.apply_cart(cart),
                Err(e) => {
                    warn!(error = %e, "{failure}");
                    if let (ShopifyError::NotFound(_), Some(cart_id)) = (&e, target) {
                        s.clear_if_current(cart_id);
                    }
                    s.notice = Some(CartNotice::new(failure));
                    outcome = Err(e.into());
                }
            }
        });
        outcome
    }
}
