//! Domain primitives, ports, and the recovery scheduler.
//!
//! Purpose: Define the cart lifecycle, the recovery attempt ledger model, the
//! offer escalation ladder, and the scheduler that orchestrates them through
//! driven ports. Nothing here knows about PostgreSQL, SMTP, or HTTP.
//!
//! Public surface:
//! - Cart, CartStatus, CartRef, CartSnapshot: cart aggregate and lifecycle.
//! - Offer, OfferPolicy: promotional offers, tiers, and escalation.
//! - RecoveryAttempt, RecoverySummary, OutboundMessage: ledger and outreach.
//! - AbandonmentScheduler: periodic sweep, first contact, and follow-up.

pub mod abandonment_scheduler;
pub mod cart;
pub mod fallback_content;
pub mod offer;
pub mod ports;
pub mod recovery;

pub use self::abandonment_scheduler::{
    AbandonmentScheduler, AbandonmentSchedulerConfig, AbandonmentSchedulerPorts,
    AbandonmentSchedulerRuntime, CycleSleeper, CycleStepError, SchedulerHandle, ShutdownSignal,
    TokioSleeper,
};
pub use self::cart::{
    AbandonOutcome, Cart, CartId, CartRef, CartRefError, CartSnapshot, CartStatus,
    CheckoutOutcome, Contact, ItemRequest, LineItem, Product, ProductId, ReplacedCart,
    UnknownCartStatus, cart_total, price_items,
};
pub use self::fallback_content::{FOLLOW_UP_SUBJECT_PREFIX, fallback_content, follow_up_content};
pub use self::offer::{Offer, OfferKind, OfferPolicy, UnknownOfferKind};
pub use self::recovery::{
    AttemptId, AttemptKind, CartContext, CycleReport, EngagementEvent, FollowUpCandidate,
    NewRecoveryAttempt, OutboundMessage, RecoveryAttempt, RecoveryContent, RecoverySummary,
    UnknownAttemptKind,
};
