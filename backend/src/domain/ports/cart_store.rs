//! Driven port for cart persistence.
//!
//! The store owns cart rows and their line items. Every status change goes
//! through a compare-and-set on the current status so concurrent request-layer
//! writes and scheduler cycles cannot move a cart backwards.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::define_port_error;
use crate::domain::cart::{
    AbandonOutcome, CartId, CartRef, CartSnapshot, CheckoutOutcome, ItemRequest, ReplacedCart,
};

define_port_error! {
    /// Errors raised when reading or writing carts.
    pub enum CartStoreError {
        /// Store connection could not be established.
        Connection { message } => "cart store connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message } => "cart store query failed: {message}",
        /// The addressed cart does not exist.
        NotFound { cart_id } => "cart {cart_id} not found",
        /// The cart's current status forbids the requested change.
        InvalidTransition { message } => "cart transition rejected: {message}",
    }
}

/// Port for cart lifecycle reads and writes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Active carts with a positive total, not updated since `cutoff`, that
    /// still hold items.
    async fn find_stale_active(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<CartSnapshot>, CartStoreError>;

    /// Move a cart from `active` to `abandoned`, stamping `abandoned_at = at`.
    ///
    /// Idempotent: an already abandoned cart reports its original instant and
    /// a terminal cart reports [`AbandonOutcome::Ineligible`].
    async fn transition_to_abandoned(
        &self,
        cart_id: CartId,
        at: DateTime<Utc>,
    ) -> Result<AbandonOutcome, CartStoreError>;

    /// Replace the items of the shopper's active cart and recompute its total
    /// atomically, creating a fresh active cart when none exists.
    ///
    /// ```rust,ignore
    /// let cart_ref = CartRef::for_session("sess-42")?;
    /// let replaced = store.replace_items(&cart_ref, &items, clock.utc()).await?;
    /// assert!(replaced.created);
    /// ```
    async fn replace_items(
        &self,
        cart_ref: &CartRef,
        items: &[ItemRequest],
        at: DateTime<Utc>,
    ) -> Result<ReplacedCart, CartStoreError>;

    /// Record a terminal checkout event on the cart.
    async fn mark_checkout(
        &self,
        cart_id: CartId,
        outcome: CheckoutOutcome,
        at: DateTime<Utc>,
    ) -> Result<(), CartStoreError>;

    /// Load a cart with its items and contact.
    async fn find_cart(&self, cart_id: CartId) -> Result<Option<CartSnapshot>, CartStoreError>;
}
