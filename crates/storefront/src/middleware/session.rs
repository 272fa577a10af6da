//! Session middleware configuration.
//!
//! Visitor sessions live in a bounded [`MokaSessionStore`]. They hold the
//! visitor's cart-store key, the backend cart id and the UTM record.

use tower_sessions::{Expiry, SessionManagerLayer};

use super::session_store::MokaSessionStore;
use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "julie_session";

/// Session expiry time in seconds (30 days, matching UTM attribution).
const SESSION_EXPIRY_SECONDS: i64 = 30 * 24 * 60 * 60;

/// Most sessions held at once; the least used are evicted beyond this.
const MAX_SESSIONS: u64 = 100_000;

/// Session keys.
pub mod keys {
    /// Key selecting the visitor's in-memory cart store.
    pub const VISITOR_ID: &str = "visitor_id";

    /// Key for storing the Shopify cart ID.
    pub const CART_ID: &str = "cart_id";
}

/// Create the session layer over a bounded in-memory store.
#[must_use]
pub fn create_session_layer(config: &StorefrontConfig) -> SessionManagerLayer<MokaSessionStore> {
    SessionManagerLayer::new(MokaSessionStore::new(MAX_SESSIONS))
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
