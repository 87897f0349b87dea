//! End-to-end recovery lifecycle against the in-memory adapters.
//!
//! Drives the public cart store and ledger ports alongside the scheduler: a
//! cart goes stale, is abandoned and contacted, escalates, and finally
//! converts.

use std::sync::Arc;
use std::time::Duration;

use cart_recovery::domain::ports::{CartStore, DisabledContentGenerator, RecoveryLedger};
use cart_recovery::domain::{
    AbandonmentScheduler, AbandonmentSchedulerConfig, AbandonmentSchedulerPorts,
    AbandonmentSchedulerRuntime, AttemptKind, CartRef, CartStatus, CheckoutOutcome,
    EngagementEvent, ItemRequest, OfferKind, SchedulerHandle, ShutdownSignal,
};
use cart_recovery::test_support::{
    ImmediateSleeper, InMemoryRecoveryStore, MutableClock, RecordingMetrics, RecordingNotifier,
};
use chrono::{DateTime, TimeZone, Utc};
use rstest::{fixture, rstest};
use rust_decimal::Decimal;

const USER_REF: &str = "user-grace";
const USER_EMAIL: &str = "grace@example.com";
const CHECKOUT_BASE_URL: &str = "https://shop.example";

#[fixture]
fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 10, 0, 0)
        .single()
        .expect("valid fixture time")
}

struct Shop {
    store: Arc<InMemoryRecoveryStore>,
    notifier: Arc<RecordingNotifier>,
    metrics: Arc<RecordingMetrics>,
    clock: Arc<MutableClock>,
    scheduler: AbandonmentScheduler,
}

impl Shop {
    fn open(now: DateTime<Utc>) -> Self {
        let store = Arc::new(InMemoryRecoveryStore::new());
        store.add_contact(USER_REF, USER_EMAIL, Some("Grace"));
        let notifier = Arc::new(RecordingNotifier::default());
        let metrics = Arc::new(RecordingMetrics::default());
        let clock = Arc::new(MutableClock::new(now));
        let scheduler = AbandonmentScheduler::with_runtime(
            AbandonmentSchedulerPorts::new(
                store.clone(),
                store.clone(),
                Arc::new(DisabledContentGenerator),
                notifier.clone(),
                metrics.clone(),
            ),
            clock.clone(),
            AbandonmentSchedulerRuntime {
                sleeper: Arc::new(ImmediateSleeper),
            },
            AbandonmentSchedulerConfig {
                checkout_base_url: CHECKOUT_BASE_URL.to_owned(),
                ..AbandonmentSchedulerConfig::default()
            },
        );
        Self {
            store,
            notifier,
            metrics,
            clock,
            scheduler,
        }
    }

    fn user_ref() -> CartRef {
        CartRef::new(Some(USER_REF.to_owned()), None).expect("user ref is valid")
    }
}

#[rstest]
#[tokio::test]
async fn abandoned_cart_is_recovered_after_follow_up(now: DateTime<Utc>) {
    let shop = Shop::open(now);
    let lamp = shop.store.add_product("Desk lamp", Decimal::new(3000, 2));
    let cart = CartStore::replace_items(
        shop.store.as_ref(),
        &Shop::user_ref(),
        &[ItemRequest {
            product_id: lamp.id,
            quantity: 2,
        }],
        now,
    )
    .await
    .expect("cart written");
    assert!(cart.created);
    assert_eq!(cart.total_value, Decimal::new(6000, 2));

    shop.clock.advance_minutes(31);
    let first = shop.scheduler.run_cycle(&ShutdownSignal::never()).await;

    assert_eq!(first.abandoned, 1);
    assert_eq!(first.first_contacts, 1);
    assert_eq!(first.fallbacks, 1);
    let sent = shop.notifier.sent();
    let first_message = sent.first().expect("first contact sent");
    assert_eq!(first_message.to, USER_EMAIL);
    assert!(
        first_message
            .body
            .ends_with(&format!("{CHECKOUT_BASE_URL}/checkout/{}", cart.cart_id))
    );
    let summary = RecoveryLedger::summary(shop.store.as_ref())
        .await
        .expect("summary available");
    assert_eq!(summary.abandoned_carts, 1);
    assert_eq!(summary.carts_awaiting_follow_up, 1);
    assert_eq!(summary.undelivered_attempts, 0);

    shop.clock.advance_hours(25);
    let second = shop.scheduler.run_cycle(&ShutdownSignal::never()).await;

    assert_eq!(second.follow_ups, 1);
    let attempts = shop.store.attempts(cart.cart_id);
    let [initial, follow_up] = attempts.as_slice() else {
        panic!("expected two attempts, got {attempts:?}");
    };
    assert_eq!(initial.kind, AttemptKind::Initial);
    assert_eq!(initial.offer.kind, OfferKind::FreeShipping);
    assert_eq!(follow_up.kind, AttemptKind::FollowUp);
    assert_eq!(follow_up.offer.kind, OfferKind::PercentageDiscount);
    assert_eq!(follow_up.offer.value, Decimal::from(5));

    let ledger: &dyn RecoveryLedger = shop.store.as_ref();
    ledger
        .record_engagement(follow_up.id, EngagementEvent::Opened)
        .await
        .expect("open recorded");
    ledger
        .record_engagement(follow_up.id, EngagementEvent::Clicked)
        .await
        .expect("click recorded");
    CartStore::mark_checkout(
        shop.store.as_ref(),
        cart.cart_id,
        CheckoutOutcome::Recovered,
        now,
    )
    .await
    .expect("checkout accepted");
    ledger
        .record_engagement(follow_up.id, EngagementEvent::Recovered)
        .await
        .expect("conversion recorded");

    shop.clock.advance_hours(25);
    let third = shop.scheduler.run_cycle(&ShutdownSignal::never()).await;

    assert_eq!(third.attempts_recorded(), 0);
    assert_eq!(
        shop.store.cart(cart.cart_id).map(|cart| cart.status),
        Some(CartStatus::Recovered)
    );
    let summary = ledger.summary().await.expect("summary available");
    assert_eq!(summary.abandoned_carts, 0);
    assert_eq!(summary.recovered_attempts, 1);
    assert_eq!(shop.metrics.reports().len(), 3);
}

#[rstest]
#[tokio::test]
async fn refreshed_cart_escapes_the_sweep(now: DateTime<Utc>) {
    let shop = Shop::open(now);
    let mug = shop.store.add_product("Mug", Decimal::from(12));
    let items = [ItemRequest {
        product_id: mug.id,
        quantity: 1,
    }];
    let first = CartStore::replace_items(shop.store.as_ref(), &Shop::user_ref(), &items, now)
        .await
        .expect("cart written");

    shop.clock.advance_minutes(20);
    let refreshed = CartStore::replace_items(
        shop.store.as_ref(),
        &Shop::user_ref(),
        &items,
        now + chrono::TimeDelta::minutes(20),
    )
    .await
    .expect("cart refreshed");
    shop.clock.advance_minutes(20);
    let report = shop.scheduler.run_cycle(&ShutdownSignal::never()).await;

    assert_eq!(refreshed.cart_id, first.cart_id);
    assert!(!refreshed.created);
    assert_eq!(report.abandoned, 0);
    assert!(shop.notifier.sent().is_empty());
}

#[rstest]
#[tokio::test]
async fn spawned_scheduler_runs_a_cycle_and_stops(now: DateTime<Utc>) {
    let shop = Shop::open(now);
    let scheduler = AbandonmentScheduler::new(
        AbandonmentSchedulerPorts::new(
            shop.store.clone(),
            shop.store.clone(),
            Arc::new(DisabledContentGenerator),
            shop.notifier.clone(),
            shop.metrics.clone(),
        ),
        shop.clock.clone(),
        AbandonmentSchedulerConfig {
            cycle_interval: Duration::from_secs(3600),
            ..AbandonmentSchedulerConfig::default()
        },
    );
    let handle = SchedulerHandle::spawn(Arc::new(scheduler));

    tokio::time::timeout(Duration::from_secs(5), async {
        while shop.metrics.reports().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("first cycle runs immediately");
    handle.shutdown().await.expect("scheduler stops cleanly");

    assert_eq!(shop.metrics.reports().len(), 1);
}
