//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                    - Health check
//!
//! # Products
//! GET  /products/{handle}         - Product detail with option value states
//! POST /products/{handle}/select  - Resolve an option change
//!
//! # Cart (JSON snapshots)
//! GET  /cart                      - Cart snapshot
//! POST /cart/add                  - Add to cart
//! POST /cart/update               - Update quantity (0 removes)
//! POST /cart/remove               - Remove item
//! POST /cart/drawer               - Drawer event (open, close, transition_end, escape)
//! POST /cart/notice/dismiss       - Clear the cart notice
//!
//! # Checkout
//! GET  /checkout                  - 303 to the composed Shopify checkout
//! ```

pub mod cart;
pub mod products;

use axum::{
    Router,
    extract::Request,
    middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::cart::CartBackend;
use crate::middleware::{create_session_layer, request_id_middleware};
use crate::state::AppState;
use crate::tracking::capture_tracking_middleware;

/// Create the product routes router.
pub fn product_routes<B: CartBackend + Clone>() -> Router<AppState<B>> {
    Router::new()
        .route("/{handle}", get(products::show::<B>))
        .route("/{handle}/select", post(products::select::<B>))
}

/// Create the cart routes router.
pub fn cart_routes<B: CartBackend + Clone>() -> Router<AppState<B>> {
    Router::new()
        .route("/", get(cart::show::<B>))
        .route("/add", post(cart::add::<B>))
        .route("/update", post(cart::update::<B>))
        .route("/remove", post(cart::remove::<B>))
        .route("/drawer", post(cart::drawer::<B>))
        .route("/notice/dismiss", post(cart::dismiss_notice::<B>))
}

/// Create all routes for the storefront.
pub fn routes<B: CartBackend + Clone>() -> Router<AppState<B>> {
    Router::new()
        .route("/health", get(health))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .route("/checkout", get(cart::checkout::<B>))
}

/// The full application with its middleware stack, minus the Sentry layers
/// added by the binary.
pub fn app<B: CartBackend + Clone>(state: AppState<B>) -> Router {
    let session_layer = create_session_layer(state.config());

    routes()
        .layer(middleware::from_fn(capture_tracking_middleware))
        .layer(session_layer)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check Shopify.
async fn health() -> &'static str {
    "ok"
}
