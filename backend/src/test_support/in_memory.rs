//! In-memory cart store and recovery ledger sharing one state.
//!
//! Mirrors the PostgreSQL adapters' predicates so scheduler scenarios can run
//! without a database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::ports::{CartStore, CartStoreError, RecoveryLedger, RecoveryLedgerError};
use crate::domain::{
    AbandonOutcome, AttemptId, Cart, CartId, CartRef, CartSnapshot, CartStatus, CheckoutOutcome,
    Contact, EngagementEvent, FollowUpCandidate, ItemRequest, LineItem, NewRecoveryAttempt,
    Product, ProductId, RecoveryAttempt, RecoverySummary, ReplacedCart, cart_total, price_items,
};

const OFFLINE_MESSAGE: &str = "in-memory store offline";

struct StoredCart {
    cart: Cart,
    items: Vec<LineItem>,
}

#[derive(Default)]
struct State {
    products: Vec<Product>,
    contacts: HashMap<String, Contact>,
    carts: Vec<StoredCart>,
    attempts: Vec<RecoveryAttempt>,
}

impl State {
    fn stored(&self, cart_id: CartId) -> Option<&StoredCart> {
        self.carts.iter().find(|stored| stored.cart.id == cart_id)
    }

    fn stored_mut(&mut self, cart_id: CartId) -> Option<&mut StoredCart> {
        self.carts.iter_mut().find(|stored| stored.cart.id == cart_id)
    }

    fn snapshot(&self, stored: &StoredCart) -> CartSnapshot {
        CartSnapshot {
            cart: stored.cart.clone(),
            items: stored.items.clone(),
            contact: stored
                .cart
                .user_ref
                .as_ref()
                .and_then(|user_ref| self.contacts.get(user_ref))
                .cloned(),
        }
    }

    fn attempts_for(&self, cart_id: CartId) -> Vec<RecoveryAttempt> {
        let mut attempts: Vec<_> = self
            .attempts
            .iter()
            .filter(|attempt| attempt.cart_id == cart_id)
            .cloned()
            .collect();
        attempts.sort_by_key(|attempt| attempt.sent_at);
        attempts
    }

    fn replace_items(
        &mut self,
        cart_ref: &CartRef,
        requests: &[ItemRequest],
        at: DateTime<Utc>,
    ) -> ReplacedCart {
        let items = price_items(requests, &self.products);
        let total_value = cart_total(&items);
        let existing = self
            .carts
            .iter_mut()
            .filter(|stored| stored.cart.status == CartStatus::Active)
            .filter(|stored| cart_ref.matches(&stored.cart))
            .max_by_key(|stored| stored.cart.created_at);

        if let Some(stored) = existing {
            stored.items = items;
            stored.cart.total_value = total_value;
            stored.cart.updated_at = at;
            return ReplacedCart {
                cart_id: stored.cart.id,
                total_value,
                created: false,
            };
        }

        let cart = Cart {
            id: CartId::random(),
            user_ref: cart_ref.user_ref().map(str::to_owned),
            session_ref: cart_ref.session_ref().map(str::to_owned),
            status: CartStatus::Active,
            total_value,
            created_at: at,
            updated_at: at,
            abandoned_at: None,
        };
        let cart_id = cart.id;
        self.carts.push(StoredCart { cart, items });
        ReplacedCart {
            cart_id,
            total_value,
            created: true,
        }
    }
}

/// Shared in-memory implementation of [`CartStore`] and [`RecoveryLedger`].
#[derive(Default)]
pub struct InMemoryRecoveryStore {
    state: Mutex<State>,
    offline: AtomicBool,
}

impl InMemoryRecoveryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("in-memory store mutex"),
        }
    }

    fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    /// Make every port call fail as if the database were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Add a catalogue product.
    pub fn add_product(&self, name: &str, unit_price: Decimal) -> Product {
        let product = Product {
            id: ProductId::random(),
            name: name.to_owned(),
            unit_price,
            stock_quantity: 100,
            category: None,
        };
        self.lock().products.push(product.clone());
        product
    }

    /// Register contact details for a user identity.
    pub fn add_contact(&self, user_ref: &str, email: &str, display_name: Option<&str>) {
        self.lock().contacts.insert(
            user_ref.to_owned(),
            Contact {
                email: email.to_owned(),
                display_name: display_name.map(str::to_owned),
            },
        );
    }

    /// Write items for `cart_ref` as of `at`, bypassing the offline switch.
    pub fn seed_cart(
        &self,
        cart_ref: &CartRef,
        items: &[ItemRequest],
        at: DateTime<Utc>,
    ) -> ReplacedCart {
        self.lock().replace_items(cart_ref, items, at)
    }

    /// Force a cart's status, bypassing lifecycle validation.
    pub fn force_status(&self, cart_id: CartId, status: CartStatus, at: DateTime<Utc>) {
        let mut state = self.lock();
        if let Some(stored) = state.stored_mut(cart_id) {
            stored.cart.status = status;
            if status == CartStatus::Abandoned && stored.cart.abandoned_at.is_none() {
                stored.cart.abandoned_at = Some(at);
            }
        }
    }

    /// Append an attempt directly, bypassing the offline switch.
    pub fn seed_attempt(&self, attempt: &NewRecoveryAttempt) -> RecoveryAttempt {
        let stored = RecoveryAttempt::from_new(AttemptId::random(), attempt);
        self.lock().attempts.push(stored.clone());
        stored
    }

    /// Current cart record.
    pub fn cart(&self, cart_id: CartId) -> Option<Cart> {
        self.lock().stored(cart_id).map(|stored| stored.cart.clone())
    }

    /// Current line items for a cart.
    pub fn items(&self, cart_id: CartId) -> Vec<LineItem> {
        self.lock()
            .stored(cart_id)
            .map(|stored| stored.items.clone())
            .unwrap_or_default()
    }

    /// All attempts for a cart, oldest first.
    pub fn attempts(&self, cart_id: CartId) -> Vec<RecoveryAttempt> {
        self.lock().attempts_for(cart_id)
    }

    fn cart_guard(&self) -> Result<MutexGuard<'_, State>, CartStoreError> {
        if self.is_offline() {
            return Err(CartStoreError::connection(OFFLINE_MESSAGE));
        }
        Ok(self.lock())
    }

    fn ledger_guard(&self) -> Result<MutexGuard<'_, State>, RecoveryLedgerError> {
        if self.is_offline() {
            return Err(RecoveryLedgerError::connection(OFFLINE_MESSAGE));
        }
        Ok(self.lock())
    }
}

#[async_trait]
impl CartStore for InMemoryRecoveryStore {
    async fn find_stale_active(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<CartSnapshot>, CartStoreError> {
        let state = self.cart_guard()?;
        Ok(state
            .carts
            .iter()
            .filter(|stored| stored.cart.status == CartStatus::Active)
            .filter(|stored| stored.cart.total_value > Decimal::ZERO)
            .filter(|stored| stored.cart.updated_at < cutoff)
            .filter(|stored| !stored.items.is_empty())
            .map(|stored| state.snapshot(stored))
            .collect())
    }

    async fn transition_to_abandoned(
        &self,
        cart_id: CartId,
        at: DateTime<Utc>,
    ) -> Result<AbandonOutcome, CartStoreError> {
        let mut state = self.cart_guard()?;
        let stored = state
            .stored_mut(cart_id)
            .ok_or_else(|| CartStoreError::not_found(cart_id.to_string()))?;
        let outcome = match stored.cart.status {
            CartStatus::Active => {
                stored.cart.status = CartStatus::Abandoned;
                stored.cart.abandoned_at = Some(at);
                AbandonOutcome::Abandoned { abandoned_at: at }
            }
            CartStatus::Abandoned => AbandonOutcome::AlreadyAbandoned {
                abandoned_at: stored.cart.abandoned_at.unwrap_or(at),
            },
            status => AbandonOutcome::Ineligible { status },
        };
        Ok(outcome)
    }

    async fn replace_items(
        &self,
        cart_ref: &CartRef,
        items: &[ItemRequest],
        at: DateTime<Utc>,
    ) -> Result<ReplacedCart, CartStoreError> {
        let mut state = self.cart_guard()?;
        Ok(state.replace_items(cart_ref, items, at))
    }

    async fn mark_checkout(
        &self,
        cart_id: CartId,
        outcome: CheckoutOutcome,
        at: DateTime<Utc>,
    ) -> Result<(), CartStoreError> {
        let mut state = self.cart_guard()?;
        let stored = state
            .stored_mut(cart_id)
            .ok_or_else(|| CartStoreError::not_found(cart_id.to_string()))?;
        let target = outcome.target_status();
        if stored.cart.status == target {
            return Ok(());
        }
        if !stored.cart.status.can_transition_to(target) {
            return Err(CartStoreError::invalid_transition(format!(
                "{} -> {target}",
                stored.cart.status
            )));
        }
        stored.cart.status = target;
        stored.cart.updated_at = at;
        Ok(())
    }

    async fn find_cart(&self, cart_id: CartId) -> Result<Option<CartSnapshot>, CartStoreError> {
        let state = self.cart_guard()?;
        Ok(state.stored(cart_id).map(|stored| state.snapshot(stored)))
    }
}

#[async_trait]
impl RecoveryLedger for InMemoryRecoveryStore {
    async fn attempts_since(
        &self,
        cart_id: CartId,
        since: DateTime<Utc>,
    ) -> Result<Vec<RecoveryAttempt>, RecoveryLedgerError> {
        let state = self.ledger_guard()?;
        Ok(state
            .attempts_for(cart_id)
            .into_iter()
            .filter(|attempt| attempt.sent_at >= since)
            .collect())
    }

    async fn record_attempt(
        &self,
        attempt: &NewRecoveryAttempt,
    ) -> Result<RecoveryAttempt, RecoveryLedgerError> {
        let mut state = self.ledger_guard()?;
        let stored = RecoveryAttempt::from_new(AttemptId::random(), attempt);
        state.attempts.push(stored.clone());
        Ok(stored)
    }

    async fn unconverted_attempts_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<FollowUpCandidate>, RecoveryLedgerError> {
        let state = self.ledger_guard()?;
        let candidates = state
            .carts
            .iter()
            .filter(|stored| stored.cart.status == CartStatus::Abandoned)
            .filter_map(|stored| {
                let attempts = state.attempts_for(stored.cart.id);
                let attempt_count = u32::try_from(attempts.len()).unwrap_or(u32::MAX);
                let latest = attempts.into_iter().last()?;
                (latest.sent_at < cutoff && !latest.recovered).then(|| FollowUpCandidate {
                    attempt: latest,
                    cart: state.snapshot(stored),
                    attempt_count,
                })
            })
            .collect();
        Ok(candidates)
    }

    async fn abandoned_without_attempts(
        &self,
    ) -> Result<Vec<CartSnapshot>, RecoveryLedgerError> {
        let state = self.ledger_guard()?;
        Ok(state
            .carts
            .iter()
            .filter(|stored| stored.cart.status == CartStatus::Abandoned)
            .filter(|stored| {
                !state
                    .attempts
                    .iter()
                    .any(|attempt| attempt.cart_id == stored.cart.id)
            })
            .map(|stored| state.snapshot(stored))
            .collect())
    }

    async fn mark_delivered(&self, attempt_id: AttemptId) -> Result<(), RecoveryLedgerError> {
        let mut state = self.ledger_guard()?;
        let attempt = state
            .attempts
            .iter_mut()
            .find(|attempt| attempt.id == attempt_id)
            .ok_or_else(|| RecoveryLedgerError::not_found(attempt_id.to_string()))?;
        attempt.delivered = true;
        Ok(())
    }

    async fn record_engagement(
        &self,
        attempt_id: AttemptId,
        event: EngagementEvent,
    ) -> Result<(), RecoveryLedgerError> {
        let mut state = self.ledger_guard()?;
        let attempt = state
            .attempts
            .iter_mut()
            .find(|attempt| attempt.id == attempt_id)
            .ok_or_else(|| RecoveryLedgerError::not_found(attempt_id.to_string()))?;
        match event {
            EngagementEvent::Opened => attempt.opened = true,
            EngagementEvent::Clicked => attempt.clicked = true,
            EngagementEvent::Recovered => attempt.recovered = true,
        }
        Ok(())
    }

    async fn summary(&self) -> Result<RecoverySummary, RecoveryLedgerError> {
        let state = self.ledger_guard()?;
        let mut summary = RecoverySummary::default();
        for stored in state
            .carts
            .iter()
            .filter(|stored| stored.cart.status == CartStatus::Abandoned)
        {
            summary.abandoned_carts += 1;
            summary.abandoned_value += stored.cart.total_value;
            match state.attempts_for(stored.cart.id).len() {
                0 => summary.carts_without_attempt += 1,
                1 => summary.carts_awaiting_follow_up += 1,
                _ => {}
            }
        }
        for attempt in &state.attempts {
            if !attempt.delivered {
                summary.undelivered_attempts += 1;
            }
            if attempt.recovered {
                summary.recovered_attempts += 1;
            }
        }
        Ok(summary)
    }
}
