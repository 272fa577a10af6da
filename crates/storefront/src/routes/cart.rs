//! Cart route handlers.
//!
//! Each visitor gets a [`CartStore`] keyed by an id kept in their session.
//! The backend cart id is stored in the session too, so a store dropped from
//! memory is restored on the next request.

use axum::{
    Json,
    extract::{OriginalUri, State, rejection::JsonRejection},
    response::Redirect,
};
use chrono::Utc;
use julie_core::{CartId, LineId, Price, VariantId};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;
use uuid::Uuid;

use crate::cart::{
    CartBackend, CartError, CartNotice, CartState, CartStore, DrawerEvent, DrawerState, Key,
    LineItem,
};
use crate::checkout::resolve_checkout_url;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::session_keys;
use crate::shopify::types::Money;
use crate::state::AppState;
use crate::tracking;

/// Cart line display data.
#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    pub id: LineId,
    pub variant_id: VariantId,
    pub handle: String,
    pub title: String,
    pub variant_title: Option<String>,
    pub image_url: Option<String>,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
    pub updating: bool,
}

/// Cart display data.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub item_count: u32,
    pub subtotal: String,
    pub is_adding: bool,
    pub is_updating: bool,
    pub is_cart_open: bool,
    pub drawer: DrawerState,
    pub focus_trapped: bool,
    pub notice: Option<CartNotice>,
    pub checkout_available: bool,
}

// =============================================================================
// Type Conversions
// =============================================================================

/// Format a Shopify Money type as a price string.
fn format_price(money: &Money) -> String {
    Price::parse(&money.amount, &money.currency_code).map_or_else(
        |_| format!("{} {}", money.amount, money.currency_code),
        |p| p.to_string(),
    )
}

fn item_view(line: &LineItem, state: &CartState) -> CartItemView {
    CartItemView {
        id: line.id.clone(),
        variant_id: line.variant_id.clone(),
        handle: line.product_handle.clone(),
        title: line.product_title.clone(),
        variant_title: line.variant_title.clone(),
        image_url: line.image_url.clone(),
        quantity: line.quantity,
        price: format_price(&line.unit_price),
        line_price: format_price(&line.line_total),
        updating: state.is_line_updating(&line.id),
    }
}

impl From<&CartState> for CartView {
    fn from(state: &CartState) -> Self {
        Self {
            items: state.lines.iter().map(|l| item_view(l, state)).collect(),
            item_count: state.total_quantity,
            subtotal: state
                .subtotal
                .as_ref()
                .map_or_else(|| "$0.00".to_string(), format_price),
            is_adding: state.is_adding(),
            is_updating: state.is_updating(),
            is_cart_open: state.is_cart_open(),
            drawer: state.drawer,
            focus_trapped: state.drawer.focus_trapped(),
            notice: state.notice.clone(),
            checkout_available: state.checkout_url.is_some() && !state.lines.is_empty(),
        }
    }
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Whether a store that already holds a cart reloads it from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reload {
    /// Only restore from the session when the store has no cart.
    IfMissing,
    /// Also reload a known cart, which may have expired or been checked out.
    Always,
}

/// The visitor's cart store, restoring or reloading its cart as asked.
async fn visitor_store<B: CartBackend + Clone>(
    state: &AppState<B>,
    session: &Session,
    reload: Reload,
) -> Result<CartStore<B>> {
    let visitor = match session.get::<String>(session_keys::VISITOR_ID).await? {
        Some(visitor) => visitor,
        None => {
            let visitor = Uuid::new_v4().to_string();
            session.insert(session_keys::VISITOR_ID, &visitor).await?;
            visitor
        }
    };

    let store = state.cart_store(&visitor).await;
    let to_load = match (store.snapshot().cart_id, reload) {
        (Some(cart_id), Reload::Always) => Some(cart_id),
        (Some(_), Reload::IfMissing) => None,
        (None, _) => session.get::<CartId>(session_keys::CART_ID).await?,
    };
    if let Some(cart_id) = to_load {
        store.restore(&cart_id).await?;
        remember_cart(session, &store).await?;
    }

    Ok(store)
}

/// Keep the session's cart id in step with the store.
async fn remember_cart<B: CartBackend>(session: &Session, store: &CartStore<B>) -> Result<()> {
    match store.snapshot().cart_id {
        Some(cart_id) => session.insert(session_keys::CART_ID, cart_id).await?,
        None => {
            session.remove_value(session_keys::CART_ID).await?;
        }
    }
    Ok(())
}

fn view<B: CartBackend>(store: &CartStore<B>) -> Json<CartView> {
    Json(CartView::from(&store.snapshot()))
}

// =============================================================================
// Requests
// =============================================================================

/// Add to cart request.
#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub variant_id: VariantId,
    pub quantity: Option<i64>,
}

/// Update cart request. A quantity of zero or less removes the line.
#[derive(Debug, Deserialize)]
pub struct UpdateCartRequest {
    pub line_id: LineId,
    pub quantity: i64,
}

/// Remove from cart request.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartRequest {
    pub line_id: LineId,
}

/// Drawer input as sent by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawerAction {
    Open,
    Close,
    TransitionEnd,
    Escape,
}

impl From<DrawerAction> for DrawerEvent {
    fn from(action: DrawerAction) -> Self {
        match action {
            DrawerAction::Open => Self::Toggle { open: true },
            DrawerAction::Close => Self::Toggle { open: false },
            DrawerAction::TransitionEnd => Self::TransitionEnd,
            DrawerAction::Escape => Self::KeyPress { key: Key::Escape },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DrawerRequest {
    pub event: DrawerAction,
}

/// What an update request asks the store to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineChange {
    Set(u32),
    Remove,
}

impl LineChange {
    fn from_quantity(quantity: i64) -> Result<Self> {
        if quantity <= 0 {
            return Ok(Self::Remove);
        }
        u32::try_from(quantity)
            .map(Self::Set)
            .map_err(|_| AppError::BadRequest(format!("quantity {quantity} is too large")))
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the cart, reloading it so expired or completed carts drop out.
#[instrument(skip(state, session))]
pub async fn show<B: CartBackend + Clone>(
    State(state): State<AppState<B>>,
    session: Session,
) -> Result<Json<CartView>> {
    let store = visitor_store(&state, &session, Reload::Always).await?;
    Ok(view(&store))
}

/// Add item to cart.
///
/// Creates a new cart if one doesn't exist, or adds to the existing cart.
#[instrument(skip(state, session, payload))]
pub async fn add<B: CartBackend + Clone>(
    State(state): State<AppState<B>>,
    session: Session,
    payload: std::result::Result<Json<AddToCartRequest>, JsonRejection>,
) -> Result<Json<CartView>> {
    let Json(request) = payload?;
    let quantity = u32::try_from(request.quantity.unwrap_or(1))
        .map_err(|_| CartError::InvalidQuantity)?;

    let store = visitor_store(&state, &session, Reload::IfMissing).await?;
    add_breadcrumb(
        "cart",
        "Add to cart",
        Some(&[("variant_id", request.variant_id.as_str())]),
    );

    let result = store.add_item(&request.variant_id, quantity).await;
    remember_cart(&session, &store).await?;
    result?;
    Ok(view(&store))
}

/// Update a line quantity; zero or less removes the line.
#[instrument(skip(state, session, payload))]
pub async fn update<B: CartBackend + Clone>(
    State(state): State<AppState<B>>,
    session: Session,
    payload: std::result::Result<Json<UpdateCartRequest>, JsonRejection>,
) -> Result<Json<CartView>> {
    let Json(request) = payload?;
    let change = LineChange::from_quantity(request.quantity)?;

    let store = visitor_store(&state, &session, Reload::IfMissing).await?;
    let quantity = request.quantity.to_string();
    add_breadcrumb(
        "cart",
        "Update cart line",
        Some(&[("line_id", request.line_id.as_str()), ("quantity", quantity.as_str())]),
    );

    let result = match change {
        LineChange::Set(quantity) => store.update_item(&request.line_id, quantity).await,
        LineChange::Remove => store.remove_item(&request.line_id).await,
    };
    remember_cart(&session, &store).await?;
    result?;
    Ok(view(&store))
}

/// Remove a line.
#[instrument(skip(state, session, payload))]
pub async fn remove<B: CartBackend + Clone>(
    State(state): State<AppState<B>>,
    session: Session,
    payload: std::result::Result<Json<RemoveFromCartRequest>, JsonRejection>,
) -> Result<Json<CartView>> {
    let Json(request) = payload?;
    let store = visitor_store(&state, &session, Reload::IfMissing).await?;
    add_breadcrumb(
        "cart",
        "Remove cart line",
        Some(&[("line_id", request.line_id.as_str())]),
    );

    let result = store.remove_item(&request.line_id).await;
    remember_cart(&session, &store).await?;
    result?;
    Ok(view(&store))
}

/// Drive the drawer state machine.
#[instrument(skip(state, session, payload))]
pub async fn drawer<B: CartBackend + Clone>(
    State(state): State<AppState<B>>,
    session: Session,
    payload: std::result::Result<Json<DrawerRequest>, JsonRejection>,
) -> Result<Json<CartView>> {
    let Json(request) = payload?;
    let store = visitor_store(&state, &session, Reload::IfMissing).await?;
    store.dispatch(request.event.into());
    Ok(view(&store))
}

/// Clear the cart notice.
#[instrument(skip(state, session))]
pub async fn dismiss_notice<B: CartBackend + Clone>(
    State(state): State<AppState<B>>,
    session: Session,
) -> Result<Json<CartView>> {
    let store = visitor_store(&state, &session, Reload::IfMissing).await?;
    store.dismiss_notice();
    Ok(view(&store))
}

/// Redirect to the composed checkout URL, or back to the cart when there is
/// nothing to check out.
#[instrument(skip(state, session, uri))]
pub async fn checkout<B: CartBackend + Clone>(
    State(state): State<AppState<B>>,
    session: Session,
    OriginalUri(uri): OriginalUri,
) -> Result<Redirect> {
    let store = visitor_store(&state, &session, Reload::Always).await?;
    let snapshot = store.snapshot();

    let (Some(cart_id), Some(base)) = (snapshot.cart_id, snapshot.checkout_url) else {
        return Ok(Redirect::to("/cart"));
    };
    if snapshot.lines.is_empty() {
        return Ok(Redirect::to("/cart"));
    }

    let utm = tracking::get_all(&session, uri.query(), Utc::now()).await?;
    add_breadcrumb("cart", "Checkout", Some(&[("cart_id", cart_id.as_str())]));

    let url = resolve_checkout_url(
        store.backend(),
        &cart_id,
        &base,
        &state.config().checkout,
        &utm,
    )
    .await;
    Ok(Redirect::to(&url))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_format_price() {
        let money = Money {
            amount: "19.9".to_string(),
            currency_code: "USD".to_string(),
        };
        assert_eq!(format_price(&money), "$19.90");

        let money = Money {
            amount: "1000".to_string(),
            currency_code: "JPY".to_string(),
        };
        assert_eq!(format_price(&money), "1000 JPY");
    }

    #[test]
    fn test_drawer_actions_map_to_events() {
        assert_eq!(
            DrawerEvent::from(DrawerAction::Escape),
            DrawerEvent::KeyPress { key: Key::Escape }
        );
        assert_eq!(
            DrawerEvent::from(DrawerAction::Open),
            DrawerEvent::Toggle { open: true }
        );
    }

    #[test]
    fn test_non_positive_quantity_removes() {
        assert_eq!(LineChange::from_quantity(0).unwrap(), LineChange::Remove);
        assert_eq!(LineChange::from_quantity(-3).unwrap(), LineChange::Remove);
        assert_eq!(LineChange::from_quantity(4).unwrap(), LineChange::Set(4));
        assert!(matches!(
            LineChange::from_quantity(i64::MAX),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_empty_cart_view() {
        let view = CartView::from(&CartState::default());
        assert_eq!(view.subtotal, "$0.00");
        assert_eq!(view.item_count, 0);
        assert!(!view.checkout_available);
        assert!(!view.is_cart_open);
    }
}
