//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! This module follows the hexagonal architecture pattern, providing concrete
//! implementations of domain port traits:
//!
//! - **persistence**: PostgreSQL cart store and recovery ledger using Diesel
//! - **content**: OpenAI-compatible chat completion content generator
//! - **notifier**: SMTP delivery and a logging stand-in
//! - **metrics**: Prometheus cycle counters (feature-gated)
//!
//! Adapters are thin translators that convert between domain types and
//! infrastructure-specific representations. They contain no business logic.

pub mod content;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod notifier;
pub mod persistence;
