//! Recovery attempts, outreach content, and ledger read models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::cart::{CartId, CartSnapshot, uuid_identifier};
use super::offer::Offer;

uuid_identifier! {
    /// Recovery attempt identifier.
    AttemptId
}

/// Position of an attempt on a cart's outreach ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptKind {
    /// First contact after abandonment.
    Initial,
    /// Escalated follow-up after the grace period.
    FollowUp,
}

impl AttemptKind {
    /// Stable storage label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "email",
            Self::FollowUp => "follow_up_email",
        }
    }
}

impl fmt::Display for AttemptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a stored recovery method label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown recovery method: {0}")]
pub struct UnknownAttemptKind(pub String);

impl FromStr for AttemptKind {
    type Err = UnknownAttemptKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "email" => Ok(Self::Initial),
            "follow_up_email" => Ok(Self::FollowUp),
            other => Err(UnknownAttemptKind(other.to_owned())),
        }
    }
}

/// Subject and body of a recovery message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryContent {
    /// Message subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

/// Cart facts handed to the content generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartContext {
    /// Cart being recovered.
    pub cart_id: CartId,
    /// Greeting name.
    pub customer_name: String,
    /// Item list, e.g. `Smartphone (1), Yoga Mat (2)`.
    pub items_summary: String,
    /// Cart value.
    pub total_value: Decimal,
}

impl From<&CartSnapshot> for CartContext {
    fn from(snapshot: &CartSnapshot) -> Self {
        Self {
            cart_id: snapshot.cart.id,
            customer_name: snapshot.customer_name().to_owned(),
            items_summary: snapshot.items_summary(),
            total_value: snapshot.cart.total_value,
        }
    }
}

/// Append-only ledger entry before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecoveryAttempt {
    /// Cart the outreach targets.
    pub cart_id: CartId,
    /// Ladder position.
    pub kind: AttemptKind,
    /// Instant the attempt was issued.
    pub sent_at: DateTime<Utc>,
    /// Message content.
    pub content: RecoveryContent,
    /// Attached offer.
    pub offer: Offer,
}

/// Persisted recovery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryAttempt {
    /// Attempt identifier.
    pub id: AttemptId,
    /// Cart the outreach targets.
    pub cart_id: CartId,
    /// Ladder position.
    pub kind: AttemptKind,
    /// Instant the attempt was issued.
    pub sent_at: DateTime<Utc>,
    /// Message content.
    pub content: RecoveryContent,
    /// Attached offer.
    pub offer: Offer,
    /// The notifier accepted the message.
    pub delivered: bool,
    /// Tracking saw the message opened.
    pub opened: bool,
    /// Tracking saw the checkout link clicked.
    pub clicked: bool,
    /// The cart converted after this attempt.
    pub recovered: bool,
}

impl RecoveryAttempt {
    /// Materialise a new attempt with fresh outcome flags.
    pub fn from_new(id: AttemptId, attempt: &NewRecoveryAttempt) -> Self {
        Self {
            id,
            cart_id: attempt.cart_id,
            kind: attempt.kind,
            sent_at: attempt.sent_at,
            content: attempt.content.clone(),
            offer: attempt.offer.clone(),
            delivered: false,
            opened: false,
            clicked: false,
            recovered: false,
        }
    }
}

/// Engagement signal reported by tracking collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngagementEvent {
    /// Message opened.
    Opened,
    /// Checkout link clicked.
    Clicked,
    /// Cart converted.
    Recovered,
}

/// An attempt eligible for escalation, with the cart it targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowUpCandidate {
    /// Latest attempt for the cart.
    pub attempt: RecoveryAttempt,
    /// Cart (still abandoned) with items and contact.
    pub cart: CartSnapshot,
    /// Attempts recorded for the cart so far.
    pub attempt_count: u32,
}

/// Operational view of outreach health.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoverySummary {
    /// Carts currently abandoned.
    pub abandoned_carts: u64,
    /// Combined value of abandoned carts.
    pub abandoned_value: Decimal,
    /// Abandoned carts with no attempt at all.
    pub carts_without_attempt: u64,
    /// Abandoned carts with exactly one attempt.
    pub carts_awaiting_follow_up: u64,
    /// Attempts the notifier never confirmed.
    pub undelivered_attempts: u64,
    /// Attempts flagged as recovered.
    pub recovered_attempts: u64,
}

/// Outcome counts for one scheduler cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Carts moved from `active` to `abandoned`.
    pub abandoned: u32,
    /// First-contact attempts recorded.
    pub first_contacts: u32,
    /// Follow-up attempts recorded.
    pub follow_ups: u32,
    /// Attempts that used template content or tiered offers.
    pub fallbacks: u32,
    /// Recorded attempts the notifier did not accept.
    pub delivery_failures: u32,
    /// Steps aborted by a storage error.
    pub step_failures: u32,
    /// The cycle stopped early on shutdown.
    pub cancelled: bool,
}

impl CycleReport {
    /// Whether any step aborted, which triggers the error backoff.
    pub const fn had_step_failure(&self) -> bool {
        self.step_failures > 0
    }

    /// Attempts recorded across both outreach steps.
    pub const fn attempts_recorded(&self) -> u32 {
        self.first_contacts.saturating_add(self.follow_ups)
    }
}

/// A message ready for the notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Delivery address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body including the offer and checkout link.
    pub body: String,
}

impl OutboundMessage {
    /// Compose the outbound message for `attempt`, or `None` when the cart has
    /// no contact address.
    ///
    /// # Examples
    /// ```
    /// use cart_recovery::domain::{
    ///     AttemptId, AttemptKind, Cart, CartId, CartSnapshot, CartStatus, Contact,
    ///     NewRecoveryAttempt, Offer, OutboundMessage, RecoveryAttempt, RecoveryContent,
    /// };
    /// use chrono::Utc;
    /// use rust_decimal::Decimal;
    ///
    /// let now = Utc::now();
    /// let cart_id = CartId::random();
    /// let snapshot = CartSnapshot {
    ///     cart: Cart {
    ///         id: cart_id,
    ///         user_ref: Some("u-1".to_owned()),
    ///         session_ref: None,
    ///         status: CartStatus::Abandoned,
    ///         total_value: Decimal::from(150),
    ///         created_at: now,
    ///         updated_at: now,
    ///         abandoned_at: Some(now),
    ///     },
    ///     items: Vec::new(),
    ///     contact: Some(Contact { email: "ada@example.com".to_owned(), display_name: None }),
    /// };
    /// let attempt = RecoveryAttempt::from_new(
    ///     AttemptId::random(),
    ///     &NewRecoveryAttempt {
    ///         cart_id,
    ///         kind: AttemptKind::Initial,
    ///         sent_at: now,
    ///         content: RecoveryContent { subject: "Hi".to_owned(), body: "Come back".to_owned() },
    ///         offer: Offer::free_shipping(),
    ///     },
    /// );
    /// let message = OutboundMessage::compose(&snapshot, &attempt, "https://shop.example")
    ///     .expect("contact present");
    /// assert!(message.body.ends_with(&format!("https://shop.example/checkout/{cart_id}")));
    /// ```
    pub fn compose(
        snapshot: &CartSnapshot,
        attempt: &RecoveryAttempt,
        checkout_base_url: &str,
    ) -> Option<Self> {
        let to = snapshot.contact_email()?;
        let mut body = attempt.content.body.clone();
        let description = attempt.offer.description.trim();
        if !description.is_empty() {
            body.push_str("\n\nSpecial Offer: ");
            body.push_str(description);
        }
        body.push_str("\n\nComplete your purchase: ");
        body.push_str(&checkout_link(checkout_base_url, attempt.cart_id));

        Some(Self {
            to: to.to_owned(),
            subject: attempt.content.subject.clone(),
            body,
        })
    }
}

fn checkout_link(base_url: &str, cart_id: CartId) -> String {
    format!("{}/checkout/{cart_id}", base_url.trim_end_matches('/'))
}
