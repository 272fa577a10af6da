//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side failures to
//! Sentry before responding. All route handlers return `Result<T, AppError>`;
//! clients get a JSON body `{"error": "..."}` without internal detail.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::cart::CartError;
use crate::shopify::ShopifyError;
use crate::tracking::TrackingError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Shopify API operation failed.
    #[error("Shopify error: {0}")]
    Shopify(#[from] ShopifyError),

    /// Cart mutation was rejected.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackingError),

    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request body was missing, malformed or of the wrong shape.
    #[error("Invalid request body: {0}")]
    InvalidBody(#[from] JsonRejection),
}

fn shopify_status(err: &ShopifyError) -> StatusCode {
    match err {
        ShopifyError::NotFound(_) => StatusCode::NOT_FOUND,
        ShopifyError::UserError(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ShopifyError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Shopify(err) | Self::Cart(CartError::Backend(err)) => shopify_status(err),
            Self::Cart(CartError::InvalidQuantity) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Cart(CartError::NoCart | CartError::UnknownLine(_)) | Self::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::Cart(CartError::LineBusy(_)) => StatusCode::CONFLICT,
            Self::InvalidBody(rejection) => rejection.status(),
            Self::Tracking(_) | Self::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the client.
    fn public_message(&self) -> String {
        match self {
            Self::Shopify(ShopifyError::UserError(msg))
            | Self::Cart(CartError::Backend(ShopifyError::UserError(msg))) => msg.clone(),
            Self::Shopify(ShopifyError::NotFound(_))
            | Self::Cart(CartError::Backend(ShopifyError::NotFound(_))) => "Not found".to_string(),
            Self::Shopify(ShopifyError::RateLimited(_))
            | Self::Cart(CartError::Backend(ShopifyError::RateLimited(_))) => {
                "Too many requests, please try again shortly".to_string()
            }
            Self::Shopify(_) | Self::Cart(CartError::Backend(_)) => {
                "External service error".to_string()
            }
            Self::Cart(err) => err.to_string(),
            Self::Tracking(_) | Self::Session(_) => "Internal server error".to_string(),
            Self::NotFound(_) | Self::BadRequest(_) => self.to_string(),
            Self::InvalidBody(rejection) => rejection.body_text(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of cart
/// actions leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("variant_id", variant_id.as_str())]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
