//! PostgreSQL-backed `RecoveryLedger` implementation using Diesel ORM.
//!
//! The ledger is append-only: inserts create attempts and updates only ever
//! raise outcome flags from false to true.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::{count_star, exists, not};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::ports::{RecoveryLedger, RecoveryLedgerError};
use crate::domain::{
    AttemptId, CartId, CartSnapshot, CartStatus, EngagementEvent, FollowUpCandidate,
    NewRecoveryAttempt, RecoveryAttempt, RecoverySummary,
};

use super::cart_snapshots::{SnapshotLoadError, load_snapshots};
use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::{CartRow, NewRecoveryAttemptRow, RecoveryAttemptRow};
use super::pool::{DbPool, PoolError};
use super::schema::{carts, recovery_attempts};

/// Diesel-backed implementation of the recovery ledger port.
#[derive(Clone)]
pub struct DieselRecoveryLedger {
    pool: DbPool,
}

impl DieselRecoveryLedger {
    /// Create a new ledger with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Map pool errors to domain ledger errors.
fn map_pool_error(error: PoolError) -> RecoveryLedgerError {
    map_basic_pool_error(error, RecoveryLedgerError::connection)
}

/// Map Diesel errors to domain ledger errors.
fn map_diesel_error(error: diesel::result::Error) -> RecoveryLedgerError {
    map_basic_diesel_error(
        error,
        RecoveryLedgerError::query,
        RecoveryLedgerError::connection,
    )
}

fn map_snapshot_error(error: SnapshotLoadError) -> RecoveryLedgerError {
    match error {
        SnapshotLoadError::Diesel(error) => map_diesel_error(error),
        SnapshotLoadError::Decode(message) => RecoveryLedgerError::query(message),
    }
}

fn decode_attempts(
    rows: Vec<RecoveryAttemptRow>,
) -> Result<Vec<RecoveryAttempt>, RecoveryLedgerError> {
    rows.into_iter()
        .map(RecoveryAttempt::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(RecoveryLedgerError::query)
}

fn count_to_u64(count: i64) -> u64 {
    u64::try_from(count).unwrap_or_default()
}

/// Pick each cart's latest attempt and keep it when it is old enough and not
/// already converted. `attempts` must be ordered by `sent_at` ascending.
fn latest_unconverted(
    attempts: Vec<RecoveryAttempt>,
    cutoff: DateTime<Utc>,
) -> HashMap<CartId, (RecoveryAttempt, u32)> {
    let mut latest: HashMap<CartId, (RecoveryAttempt, u32)> = HashMap::new();
    for attempt in attempts {
        match latest.entry(attempt.cart_id) {
            Entry::Occupied(mut slot) => {
                let count = slot.get().1.saturating_add(1);
                slot.insert((attempt, count));
            }
            Entry::Vacant(slot) => {
                slot.insert((attempt, 1));
            }
        }
    }
    latest.retain(|_, (attempt, _)| attempt.sent_at < cutoff && !attempt.recovered);
    latest
}

#[async_trait]
impl RecoveryLedger for DieselRecoveryLedger {
    async fn attempts_since(
        &self,
        cart_id: CartId,
        since: DateTime<Utc>,
    ) -> Result<Vec<RecoveryAttempt>, RecoveryLedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let rows: Vec<RecoveryAttemptRow> = recovery_attempts::table
            .filter(recovery_attempts::cart_id.eq(cart_id.as_uuid()))
            .filter(recovery_attempts::sent_at.ge(since))
            .select(RecoveryAttemptRow::as_select())
            .order_by((recovery_attempts::sent_at.asc(), recovery_attempts::id.asc()))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        decode_attempts(rows)
    }

    async fn record_attempt(
        &self,
        attempt: &NewRecoveryAttempt,
    ) -> Result<RecoveryAttempt, RecoveryLedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let new_row = NewRecoveryAttemptRow {
            id: Uuid::new_v4(),
            cart_id: *attempt.cart_id.as_uuid(),
            recovery_method: attempt.kind.as_str(),
            sent_at: attempt.sent_at,
            subject: attempt.content.subject.as_str(),
            body: attempt.content.body.as_str(),
            offer_type: attempt.offer.kind.as_str(),
            offer_value: attempt.offer.value,
            offer_description: attempt.offer.description.as_str(),
        };

        let row: RecoveryAttemptRow = diesel::insert_into(recovery_attempts::table)
            .values(&new_row)
            .returning(RecoveryAttemptRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        RecoveryAttempt::try_from(row).map_err(RecoveryLedgerError::query)
    }

    async fn unconverted_attempts_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<FollowUpCandidate>, RecoveryLedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let attempt_rows: Vec<RecoveryAttemptRow> = recovery_attempts::table
            .inner_join(carts::table)
            .filter(carts::status.eq(CartStatus::Abandoned.as_str()))
            .select(RecoveryAttemptRow::as_select())
            .order_by((recovery_attempts::sent_at.asc(), recovery_attempts::id.asc()))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let mut latest = latest_unconverted(decode_attempts(attempt_rows)?, cutoff);
        if latest.is_empty() {
            return Ok(Vec::new());
        }

        let cart_ids: Vec<Uuid> = latest.keys().map(|cart_id| *cart_id.as_uuid()).collect();
        let cart_rows: Vec<CartRow> = carts::table
            .filter(carts::id.eq_any(cart_ids))
            .select(CartRow::as_select())
            .order_by(carts::abandoned_at.asc())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let snapshots = load_snapshots(&mut conn, cart_rows)
            .await
            .map_err(map_snapshot_error)?;

        Ok(snapshots
            .into_iter()
            .filter_map(|cart| {
                let (attempt, attempt_count) = latest.remove(&cart.cart.id)?;
                Some(FollowUpCandidate {
                    attempt,
                    cart,
                    attempt_count,
                })
            })
            .collect())
    }

    async fn abandoned_without_attempts(
        &self,
    ) -> Result<Vec<CartSnapshot>, RecoveryLedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let rows: Vec<CartRow> = carts::table
            .filter(carts::status.eq(CartStatus::Abandoned.as_str()))
            .filter(not(exists(
                recovery_attempts::table.filter(recovery_attempts::cart_id.eq(carts::id)),
            )))
            .select(CartRow::as_select())
            .order_by(carts::abandoned_at.asc())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        load_snapshots(&mut conn, rows)
            .await
            .map_err(map_snapshot_error)
    }

    async fn mark_delivered(&self, attempt_id: AttemptId) -> Result<(), RecoveryLedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let updated = diesel::update(
            recovery_attempts::table.filter(recovery_attempts::id.eq(attempt_id.as_uuid())),
        )
        .set(recovery_attempts::delivered.eq(true))
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;

        if updated == 0 {
            return Err(RecoveryLedgerError::not_found(attempt_id.to_string()));
        }
        Ok(())
    }

    async fn record_engagement(
        &self,
        attempt_id: AttemptId,
        event: EngagementEvent,
    ) -> Result<(), RecoveryLedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let target =
            recovery_attempts::table.filter(recovery_attempts::id.eq(attempt_id.as_uuid()));
        let update = diesel::update(target);
        let updated = match event {
            EngagementEvent::Opened => {
                update
                    .set(recovery_attempts::opened.eq(true))
                    .execute(&mut conn)
                    .await
            }
            EngagementEvent::Clicked => {
                update
                    .set(recovery_attempts::clicked.eq(true))
                    .execute(&mut conn)
                    .await
            }
            EngagementEvent::Recovered => {
                update
                    .set(recovery_attempts::recovered.eq(true))
                    .execute(&mut conn)
                    .await
            }
        }
        .map_err(map_diesel_error)?;

        if updated == 0 {
            return Err(RecoveryLedgerError::not_found(attempt_id.to_string()));
        }
        Ok(())
    }

    async fn summary(&self) -> Result<RecoverySummary, RecoveryLedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let abandoned: Vec<(Uuid, Decimal)> = carts::table
            .filter(carts::status.eq(CartStatus::Abandoned.as_str()))
            .select((carts::id, carts::total_value))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let per_cart: Vec<(Uuid, i64)> = recovery_attempts::table
            .inner_join(carts::table)
            .filter(carts::status.eq(CartStatus::Abandoned.as_str()))
            .group_by(recovery_attempts::cart_id)
            .select((recovery_attempts::cart_id, count_star()))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let undelivered: i64 = recovery_attempts::table
            .filter(recovery_attempts::delivered.eq(false))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let recovered: i64 = recovery_attempts::table
            .filter(recovery_attempts::recovered.eq(true))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        let attempt_counts: HashMap<Uuid, i64> = per_cart.into_iter().collect();
        let mut summary = RecoverySummary {
            undelivered_attempts: count_to_u64(undelivered),
            recovered_attempts: count_to_u64(recovered),
            ..RecoverySummary::default()
        };
        for (cart_id, total_value) in abandoned {
            summary.abandoned_carts += 1;
            summary.abandoned_value += total_value;
            match attempt_counts.get(&cart_id).copied().unwrap_or_default() {
                0 => summary.carts_without_attempt += 1,
                1 => summary.carts_awaiting_follow_up += 1,
                _ => {}
            }
        }
        Ok(summary)
    }
}
