//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::cart::{CartBackend, CartStore};
use crate::config::StorefrontConfig;
use crate::shopify::StorefrontClient;

/// Cart stores kept in memory per visitor.
const MAX_CART_STORES: u64 = 10_000;

/// Idle time after which a visitor's store is dropped; the session still
/// holds the cart id, so the store is restored on the next request.
const CART_STORE_IDLE: Duration = Duration::from_secs(24 * 60 * 60);

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// configuration, the Shopify client and the per-visitor cart stores. Carts
/// go through `B`, which is the Shopify client itself in production.
pub struct AppState<B = StorefrontClient> {
    inner: Arc<AppStateInner<B>>,
}

struct AppStateInner<B> {
    config: StorefrontConfig,
    storefront: StorefrontClient,
    cart_backend: B,
    carts: Cache<String, CartStore<B>>,
}

impl<B> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl AppState {
    /// Create a new application state backed by Shopify for carts too.
    #[must_use]
    pub fn new(config: StorefrontConfig) -> Self {
        let storefront = StorefrontClient::new(&config.shopify);
        Self::build(config, storefront.clone(), storefront)
    }
}

impl<B: CartBackend + Clone> AppState<B> {
    /// Create a state whose cart stores use `cart_backend`.
    ///
    /// Every visitor's store gets its own clone of the backend.
    #[must_use]
    pub fn with_cart_backend(config: StorefrontConfig, cart_backend: B) -> Self {
        let storefront = StorefrontClient::new(&config.shopify);
        Self::build(config, storefront, cart_backend)
    }

    fn build(config: StorefrontConfig, storefront: StorefrontClient, cart_backend: B) -> Self {
        let carts = Cache::builder()
            .max_capacity(MAX_CART_STORES)
            .time_to_idle(CART_STORE_IDLE)
            .build();

        Self {
            inner: Arc::new(AppStateInner {
                config,
                storefront,
                cart_backend,
                carts,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the Shopify Storefront API client.
    #[must_use]
    pub fn storefront(&self) -> &StorefrontClient {
        &self.inner.storefront
    }

    /// The cart store for a visitor, created empty on first use.
    pub async fn cart_store(&self, visitor: &str) -> CartStore<B> {
        self.inner
            .carts
            .get_with(visitor.to_string(), async {
                CartStore::new(self.inner.cart_backend.clone())
            })
            .await
    }
}
