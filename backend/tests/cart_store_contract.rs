//! Cart store port behaviour against the in-memory adapter.
//!
//! Covers item replacement, pricing of unknown products, idempotent
//! abandonment, and shopping resumed after a cart was abandoned.

use cart_recovery::domain::ports::CartStore;
use cart_recovery::domain::{
    AbandonOutcome, CartRef, CartStatus, ItemRequest, Product, ProductId,
};
use cart_recovery::test_support::InMemoryRecoveryStore;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use rstest::{fixture, rstest};
use rust_decimal::Decimal;

#[fixture]
fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0)
        .single()
        .expect("valid fixture time")
}

#[fixture]
fn shopper() -> CartRef {
    CartRef::for_user("user-linus").expect("user ref is valid")
}

fn request(product: &Product, quantity: u32) -> ItemRequest {
    ItemRequest {
        product_id: product.id,
        quantity,
    }
}

#[rstest]
#[tokio::test]
async fn replacing_items_swaps_the_whole_set(now: DateTime<Utc>, shopper: CartRef) {
    let store = InMemoryRecoveryStore::new();
    let kettle = store.add_product("Kettle", Decimal::new(4500, 2));
    let teapot = store.add_product("Teapot", Decimal::new(2250, 2));

    let first = store
        .replace_items(&shopper, &[request(&kettle, 1)], now)
        .await
        .expect("first write");
    let second = store
        .replace_items(&shopper, &[request(&teapot, 2)], now + TimeDelta::minutes(5))
        .await
        .expect("second write");

    assert_eq!(second.cart_id, first.cart_id);
    assert!(!second.created);
    assert_eq!(second.total_value, Decimal::new(4500, 2));
    let items = store.items(second.cart_id);
    let [only] = items.as_slice() else {
        panic!("expected exactly one line, got {items:?}");
    };
    assert_eq!(only.product_id, teapot.id);
    assert_eq!(only.quantity, 2);
    assert_eq!(
        store.cart(second.cart_id).map(|cart| cart.total_value),
        Some(Decimal::new(4500, 2))
    );
}

#[rstest]
#[tokio::test]
async fn unknown_products_are_dropped_from_items_and_total(
    now: DateTime<Utc>,
    shopper: CartRef,
) {
    let store = InMemoryRecoveryStore::new();
    let kettle = store.add_product("Kettle", Decimal::new(4500, 2));
    let unknown = ItemRequest {
        product_id: ProductId::random(),
        quantity: 3,
    };

    let replaced = store
        .replace_items(&shopper, &[request(&kettle, 1), unknown], now)
        .await
        .expect("write accepted");

    assert_eq!(replaced.total_value, Decimal::new(4500, 2));
    let items = store.items(replaced.cart_id);
    assert_eq!(items.len(), 1);
    assert!(items.iter().all(|item| item.product_id == kettle.id));
}

#[rstest]
#[tokio::test]
async fn abandoning_twice_keeps_the_first_timestamp(now: DateTime<Utc>, shopper: CartRef) {
    let store = InMemoryRecoveryStore::new();
    let kettle = store.add_product("Kettle", Decimal::new(4500, 2));
    let cart = store
        .replace_items(&shopper, &[request(&kettle, 1)], now)
        .await
        .expect("cart written");
    let first_at = now + TimeDelta::minutes(31);

    let first = store
        .transition_to_abandoned(cart.cart_id, first_at)
        .await
        .expect("first transition");
    let second = store
        .transition_to_abandoned(cart.cart_id, first_at + TimeDelta::minutes(5))
        .await
        .expect("second transition");

    assert_eq!(first, AbandonOutcome::Abandoned { abandoned_at: first_at });
    assert_eq!(
        second,
        AbandonOutcome::AlreadyAbandoned {
            abandoned_at: first_at
        }
    );
    assert_eq!(
        store.cart(cart.cart_id).and_then(|cart| cart.abandoned_at),
        Some(first_at)
    );
}

#[rstest]
#[tokio::test]
async fn resuming_after_abandonment_opens_a_new_cart(now: DateTime<Utc>, shopper: CartRef) {
    let store = InMemoryRecoveryStore::new();
    let kettle = store.add_product("Kettle", Decimal::new(4500, 2));
    let teapot = store.add_product("Teapot", Decimal::new(2250, 2));
    let abandoned = store
        .replace_items(&shopper, &[request(&kettle, 1)], now)
        .await
        .expect("cart written");
    let abandoned_at = now + TimeDelta::minutes(31);
    store
        .transition_to_abandoned(abandoned.cart_id, abandoned_at)
        .await
        .expect("cart abandoned");

    let resumed = store
        .replace_items(&shopper, &[request(&teapot, 1)], now + TimeDelta::hours(2))
        .await
        .expect("resumed write");

    assert!(resumed.created);
    assert_ne!(resumed.cart_id, abandoned.cart_id);
    assert_eq!(
        store.cart(resumed.cart_id).map(|cart| cart.status),
        Some(CartStatus::Active)
    );
    let original = store.cart(abandoned.cart_id).expect("abandoned cart kept");
    assert_eq!(original.status, CartStatus::Abandoned);
    assert_eq!(original.abandoned_at, Some(abandoned_at));
    assert_eq!(original.total_value, Decimal::new(4500, 2));
    let kept = store.items(abandoned.cart_id);
    assert!(kept.iter().all(|item| item.product_id == kettle.id));
    assert_eq!(kept.len(), 1);
}
