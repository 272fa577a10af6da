//! Checkout URL composition.
//!
//! The backend hands out a checkout URL on its own `myshopify.com` host. Before
//! redirecting we rewrite it onto the shop's checkout domain, apply the
//! configured discount code, and carry the visitor's UTM attribution.

use std::sync::LazyLock;

use julie_core::CartId;
use julie_core::tracking::UtmParams;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::cart::CartBackend;
use crate::config::CheckoutConfig;
use crate::shopify::types::AttributeInput;

/// Query parameter Shopify reads the discount code from.
const DISCOUNT_PARAM: &str = "discount";

/// Captures the bare host of a configured domain, dropping scheme, userinfo
/// and a leading `www.`.
static DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?(?:[^@/\n]+@)?(?:www\.)?([^:/\n?]+)").expect("Invalid regex")
});

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("invalid checkout URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("invalid checkout domain: {0}")]
    InvalidDomain(String),
}

/// Reduce a configured domain such as `https://www.shop.julie.co/` to
/// `shop.julie.co`.
#[must_use]
pub fn normalize_domain(domain: &str) -> Option<String> {
    DOMAIN_RE
        .captures(domain.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
        .filter(|host| !host.is_empty())
}

/// Compose the final checkout URL.
///
/// Parameters already on `base` win over UTM parameters with the same key,
/// and `discount` is set rather than appended. Composing an already composed
/// URL returns it unchanged.
///
/// # Errors
///
/// Returns `CheckoutError` if `base` is not a URL or the custom domain cannot
/// be used as a host.
pub fn compose_checkout_url(
    base: &str,
    config: &CheckoutConfig,
    utm: &UtmParams,
) -> Result<String, CheckoutError> {
    let discount = config
        .discount_code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty());

    if config.custom_domain.is_none() && discount.is_none() && utm.is_empty() {
        return Ok(base.to_string());
    }

    let mut url = Url::parse(base)?;

    if let Some(domain) = &config.custom_domain {
        let host =
            normalize_domain(domain).ok_or_else(|| CheckoutError::InvalidDomain(domain.clone()))?;
        let invalid = || CheckoutError::InvalidDomain(domain.clone());
        url.set_host(Some(&host)).map_err(|_| invalid())?;
        url.set_username("").map_err(|()| invalid())?;
        url.set_password(None).map_err(|()| invalid())?;
        url.set_port(None).map_err(|()| invalid())?;
        url.set_scheme("https").map_err(|()| invalid())?;
    }

    let current: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    let mut pairs = current.clone();

    if let Some(code) = discount {
        let mut seen = false;
        pairs.retain_mut(|(key, value)| {
            if key.as_str() != DISCOUNT_PARAM {
                return true;
            }
            if seen {
                return false;
            }
            seen = true;
            code.clone_into(value);
            true
        });
        if !seen {
            pairs.push((DISCOUNT_PARAM.to_string(), code.to_string()));
        }
    }

    for (key, value) in utm.iter() {
        if !pairs.iter().any(|(k, _)| k == key.as_str()) {
            pairs.push((key.as_str().to_string(), value.to_string()));
        }
    }

    if pairs != current {
        url.query_pairs_mut().clear().extend_pairs(&pairs);
    }

    Ok(url.into())
}

/// Resolve the URL a visitor is redirected to at checkout.
///
/// First records the UTM parameters on the backend cart as attributes, then
/// composes the URL. Any failure falls back to `base` unchanged.
#[instrument(skip(backend, config, utm), fields(cart_id = %cart_id))]
pub async fn resolve_checkout_url<B: CartBackend>(
    backend: &B,
    cart_id: &CartId,
    base: &str,
    config: &CheckoutConfig,
    utm: &UtmParams,
) -> String {
    if !utm.is_empty() {
        let attributes = utm
            .iter()
            .map(|(key, value)| AttributeInput {
                key: key.as_str().to_string(),
                value: value.to_string(),
            })
            .collect();

        if let Err(e) = backend.update_attributes(cart_id, attributes).await {
            warn!(error = %e, "Failed to record attribution on cart, using plain checkout URL");
            return base.to_string();
        }
    }

    match compose_checkout_url(base, config, utm) {
        Ok(url) => {
            debug!(url = %url, "Composed checkout URL");
            url
        }
        Err(e) => {
            warn!(error = %e, "Failed to compose checkout URL, using plain checkout URL");
            base.to_string()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use julie_core::tracking::TrackingKey;

    const BASE: &str = "https://julie.myshopify.com/cart/c/abc?key=1";

    fn config(domain: Option<&str>, discount: Option<&str>) -> CheckoutConfig {
        CheckoutConfig {
            custom_domain: domain.map(String::from),
            discount_code: discount.map(String::from),
        }
    }

    fn utm(pairs: &[(&str, &str)]) -> UtmParams {
        UtmParams::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn test_normalize_domain() {
        assert_eq!(
            normalize_domain("https://www.Shop.Julie.co/path").as_deref(),
            Some("shop.julie.co")
        );
        assert_eq!(normalize_domain("user:pw@julie.co:8443").as_deref(), Some("julie.co"));
        assert_eq!(normalize_domain("julie.co").as_deref(), Some("julie.co"));
        assert_eq!(normalize_domain(""), None);
    }

    #[test]
    fn test_full_composition() {
        let url = compose_checkout_url(
            "https://user:pw@julie.myshopify.com/cart/c/abc?key=1",
            &config(Some("https://www.shop.julie.co"), Some("WELCOME10")),
            &utm(&[("utm_source", "ig")]),
        )
        .unwrap();

        assert_eq!(
            url,
            "https://shop.julie.co/cart/c/abc?key=1&discount=WELCOME10&utm_source=ig"
        );
    }

    #[test]
    fn test_custom_domain_and_discount() {
        let url = compose_checkout_url(
            "https://shop.example.myshopify.com/cart/c/abc123",
            &config(Some("checkout.julie.co"), Some("SPRING10")),
            &UtmParams::new(),
        )
        .unwrap();

        let parsed = Url::parse(&url).unwrap();
        assert_eq!(parsed.host_str(), Some("checkout.julie.co"));
        assert_eq!(parsed.path(), "/cart/c/abc123");
        assert!(parsed.query_pairs().any(|(k, v)| k == "discount" && v == "SPRING10"));
    }

    #[test]
    fn test_no_inputs_returns_base_unchanged() {
        let url = compose_checkout_url(BASE, &config(None, None), &UtmParams::new()).unwrap();
        assert_eq!(url, BASE);
    }

    #[test]
    fn test_existing_params_win() {
        let url = compose_checkout_url(
            "https://julie.myshopify.com/cart/c/abc?utm_source=email",
            &config(None, None),
            &utm(&[("utm_source", "ig"), ("utm_medium", "social")]),
        )
        .unwrap();

        let parsed = Url::parse(&url).unwrap();
        let sources: Vec<_> = parsed
            .query_pairs()
            .filter(|(k, _)| k == TrackingKey::UtmSource.as_str())
            .map(|(_, v)| v.into_owned())
            .collect();
        assert_eq!(sources, vec!["email"]);
        assert!(url.contains("utm_medium=social"));
    }

    #[test]
    fn test_discount_is_set_not_duplicated() {
        let url = compose_checkout_url(
            "https://julie.myshopify.com/cart/c/abc?discount=OLD&discount=OLDER",
            &config(None, Some("NEW")),
            &UtmParams::new(),
        )
        .unwrap();
        assert_eq!(url, "https://julie.myshopify.com/cart/c/abc?discount=NEW");
    }

    #[test]
    fn test_composition_is_idempotent() {
        let cfg = config(Some("shop.julie.co"), Some("WELCOME10"));
        let params = utm(&[("utm_source", "ig"), ("utm_campaign", "fall")]);
        let once = compose_checkout_url(BASE, &cfg, &params).unwrap();
        let twice = compose_checkout_url(&once, &cfg, &params).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_http_base_is_upgraded_with_custom_domain() {
        let url = compose_checkout_url(
            "http://julie.myshopify.com:8080/cart/c/abc",
            &config(Some("shop.julie.co"), None),
            &UtmParams::new(),
        )
        .unwrap();
        assert_eq!(url, "https://shop.julie.co/cart/c/abc");
    }

    #[test]
    fn test_invalid_base_is_an_error() {
        assert!(matches!(
            compose_checkout_url("not a url", &config(Some("julie.co"), None), &UtmParams::new()),
            Err(CheckoutError::InvalidUrl(_))
        ));
    }
}
