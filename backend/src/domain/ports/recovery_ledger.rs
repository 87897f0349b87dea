//! Driven port for the append-only recovery attempt ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::define_port_error;
use crate::domain::cart::{CartId, CartSnapshot};
use crate::domain::recovery::{
    AttemptId, EngagementEvent, FollowUpCandidate, NewRecoveryAttempt, RecoveryAttempt,
    RecoverySummary,
};

define_port_error! {
    /// Errors raised by ledger adapters.
    pub enum RecoveryLedgerError {
        /// Ledger connection could not be established.
        Connection { message } => "recovery ledger connection failed: {message}",
        /// Query or insert failed during execution.
        Query { message } => "recovery ledger query failed: {message}",
        /// The addressed attempt does not exist.
        NotFound { attempt_id } => "recovery attempt {attempt_id} not found",
    }
}

/// Port for recording and querying recovery attempts.
///
/// Attempts are never deleted; only their outcome flags change.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecoveryLedger: Send + Sync {
    /// Attempts for `cart_id` with `sent_at >= since`, oldest first.
    async fn attempts_since(
        &self,
        cart_id: CartId,
        since: DateTime<Utc>,
    ) -> Result<Vec<RecoveryAttempt>, RecoveryLedgerError>;

    /// Append an attempt and return it with its assigned id.
    async fn record_attempt(
        &self,
        attempt: &NewRecoveryAttempt,
    ) -> Result<RecoveryAttempt, RecoveryLedgerError>;

    /// For each still-abandoned cart, its latest attempt when that attempt was
    /// sent before `cutoff` and is not marked recovered.
    async fn unconverted_attempts_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<FollowUpCandidate>, RecoveryLedgerError>;

    /// Abandoned carts with no attempt on record.
    async fn abandoned_without_attempts(&self)
    -> Result<Vec<CartSnapshot>, RecoveryLedgerError>;

    /// Flag an attempt as accepted by the notifier.
    async fn mark_delivered(&self, attempt_id: AttemptId) -> Result<(), RecoveryLedgerError>;

    /// Flag an engagement signal on an attempt. Flags only ever go from false
    /// to true.
    async fn record_engagement(
        &self,
        attempt_id: AttemptId,
        event: EngagementEvent,
    ) -> Result<(), RecoveryLedgerError>;

    /// Aggregate outreach health counters.
    async fn summary(&self) -> Result<RecoverySummary, RecoveryLedgerError>;
}
