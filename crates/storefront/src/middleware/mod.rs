//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (tower-sessions over a bounded `moka` store)
//! 5. UTM capture (`tracking::capture_tracking_middleware`)

pub mod request_id;
pub mod session;
pub mod session_store;

pub use request_id::{RequestId, request_id_middleware};
pub use session::{create_session_layer, keys as session_keys};
pub use session_store::MokaSessionStore;
