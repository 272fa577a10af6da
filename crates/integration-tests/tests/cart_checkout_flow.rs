//! Cart to checkout flows against the in-memory backend.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use julie_core::tracking::TrackingKey;
use julie_core::{CartId, VariantId};
use julie_integration_tests::{FakeBackend, SHOP_HOST};
use julie_storefront::cart::{CartError, CartStore};
use julie_storefront::checkout::resolve_checkout_url;
use julie_storefront::config::CheckoutConfig;
use julie_storefront::shopify::ShopifyError;
use julie_storefront::tracking;
use tower_sessions::{MemoryStore, Session};

fn shirt() -> VariantId {
    VariantId::new("gid://shopify/ProductVariant/101")
}

fn checkout_config() -> CheckoutConfig {
    CheckoutConfig {
        custom_domain: Some("https://www.shop.julie.co".to_string()),
        discount_code: Some("WELCOME10".to_string()),
    }
}

#[tokio::test]
async fn test_add_update_remove_round_trip() {
    let store = CartStore::new(FakeBackend::new());

    store.add_item(&shirt(), 1).await.unwrap();
    store.add_item(&shirt(), 2).await.unwrap();
    let state = store.snapshot();
    assert_eq!(state.lines.len(), 1);
    assert_eq!(state.lines[0].quantity, 3);
    assert_eq!(state.lines[0].variant_title.as_deref(), Some("M / Sand"));
    assert_eq!(state.subtotal.as_ref().unwrap().amount, "75.00");

    let line = state.lines[0].id.clone();
    store.update_item(&line, 1).await.unwrap();
    assert_eq!(store.snapshot().total_quantity, 1);

    store.remove_item(&line).await.unwrap();
    let state = store.snapshot();
    assert!(state.lines.is_empty());
    assert_eq!(state.total_quantity, 0);
    assert!(state.cart_id.is_some());
}

#[tokio::test]
async fn test_failed_remove_keeps_line_until_confirmed() {
    let store = CartStore::new(FakeBackend::new());
    store.add_item(&shirt(), 2).await.unwrap();
    let before = store.snapshot();
    let line = before.lines[0].id.clone();

    store.backend().fail_with("Cart is locked");
    let err = store.remove_item(&line).await.unwrap_err();
    assert!(matches!(err, CartError::Backend(ShopifyError::UserError(_))));

    let after = store.snapshot();
    assert_eq!(after.lines, before.lines);
    assert!(!after.is_updating());
    assert!(after.notice.is_some());

    store.backend().recover();
    store.dismiss_notice();
    store.remove_item(&line).await.unwrap();
    assert!(store.snapshot().lines.is_empty());
    assert!(store.snapshot().notice.is_none());
}

#[tokio::test]
async fn test_failed_add_leaves_cart_unchanged() {
    let store = CartStore::new(FakeBackend::new());
    store.backend().fail_with("Variant is sold out");

    assert!(store.add_item(&shirt(), 1).await.is_err());
    let state = store.snapshot();
    assert!(state.cart_id.is_none());
    assert!(!state.is_adding());
    assert!(state.notice.is_some());
}

#[tokio::test]
async fn test_restore_expired_cart_starts_over() {
    let store = CartStore::new(FakeBackend::new());
    let stale = CartId::new("gid://shopify/Cart/stale");
    store.restore(&stale).await.unwrap();
    assert!(store.snapshot().cart_id.is_none());

    store.add_item(&shirt(), 1).await.unwrap();
    let cart_id = store.snapshot().cart_id.unwrap();
    assert_ne!(cart_id, stale);

    store.backend().expire(&cart_id);
    let line = store.snapshot().lines[0].id.clone();
    assert!(matches!(
        store.update_item(&line, 4).await,
        Err(CartError::Backend(ShopifyError::NotFound(_)))
    ));
    let state = store.snapshot();
    assert!(state.cart_id.is_none());
    assert!(state.lines.is_empty());
}

#[tokio::test]
async fn test_add_to_dropped_cart_starts_a_new_one() {
    let store = CartStore::new(FakeBackend::new());
    store.add_item(&shirt(), 2).await.unwrap();
    let dropped = store.snapshot().cart_id.unwrap();
    store.backend().expire(&dropped);

    for _ in 0..2 {
        store.add_item(&shirt(), 1).await.unwrap();
    }

    let state = store.snapshot();
    let cart_id = state.cart_id.unwrap();
    assert_ne!(cart_id, dropped);
    assert_eq!(state.lines.len(), 1);
    assert_eq!(state.lines[0].quantity, 2);
    assert!(state.notice.is_none());
}

#[tokio::test]
async fn test_refresh_drops_a_completed_cart() {
    let store = CartStore::new(FakeBackend::new());
    store.add_item(&shirt(), 1).await.unwrap();
    store.backend().expire(&store.snapshot().cart_id.unwrap());

    store.refresh().await.unwrap();
    let state = store.snapshot();
    assert!(state.cart_id.is_none());
    assert!(state.lines.is_empty());

    store.refresh().await.unwrap();
    assert!(store.snapshot().cart_id.is_none());
}

#[tokio::test]
async fn test_checkout_carries_attribution() {
    let session = Session::new(None, Arc::new(MemoryStore::default()), None);
    let landed = Utc.with_ymd_and_hms(2026, 9, 1, 9, 30, 0).unwrap();
    let landing = tracking::capture_from_query(Some("utm_source=ig&utm_campaign=fall&ref=x"));
    tracking::persist(&session, &landing, landed).await.unwrap();

    let store = CartStore::new(FakeBackend::new());
    store.add_item(&shirt(), 1).await.unwrap();
    let state = store.snapshot();
    let cart_id = state.cart_id.unwrap();
    let base = state.checkout_url.unwrap();

    let utm = tracking::get_all(&session, Some("utm_medium=story"), landed + Duration::days(3))
        .await
        .unwrap();
    let url =
        resolve_checkout_url(store.backend(), &cart_id, &base, &checkout_config(), &utm).await;

    assert!(url.starts_with("https://shop.julie.co/cart/c/"));
    assert!(url.contains("discount=WELCOME10"));
    assert!(url.contains("utm_source=ig"));
    assert!(url.contains("utm_medium=story"));
    assert!(url.contains("utm_campaign=fall"));
    assert!(!url.contains("ref="));

    let updates = store.backend().attribute_updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, cart_id);
    let keys: Vec<_> = updates[0].1.iter().map(|a| a.key.as_str()).collect();
    assert!(keys.contains(&TrackingKey::UtmSource.as_str()));
}

#[tokio::test]
async fn test_checkout_falls_back_when_attributes_fail() {
    let store = CartStore::new(FakeBackend::new());
    store.add_item(&shirt(), 1).await.unwrap();
    let state = store.snapshot();
    let base = state.checkout_url.unwrap();

    store.backend().fail_attributes();
    let utm = tracking::capture_from_query(Some("utm_source=ig"));
    let url = resolve_checkout_url(
        store.backend(),
        &state.cart_id.unwrap(),
        &base,
        &checkout_config(),
        &utm,
    )
    .await;

    assert_eq!(url, base);
    assert!(url.contains(SHOP_HOST));
}

#[tokio::test]
async fn test_checkout_without_attribution_skips_attribute_update() {
    let store = CartStore::new(FakeBackend::new());
    store.add_item(&shirt(), 1).await.unwrap();
    let state = store.snapshot();

    let url = resolve_checkout_url(
        store.backend(),
        &state.cart_id.unwrap(),
        &state.checkout_url.unwrap(),
        &CheckoutConfig::default(),
        &tracking::capture_from_query(None),
    )
    .await;

    assert!(url.contains(SHOP_HOST));
    assert!(store.backend().attribute_updates().is_empty());
}
