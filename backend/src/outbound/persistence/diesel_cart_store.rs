//! PostgreSQL-backed `CartStore` implementation using Diesel ORM.
//!
//! Status changes are compare-and-set updates filtered on the status the
//! caller observed, so a checkout racing a scheduler sweep leaves exactly one
//! winner. Item replacement runs in a single transaction with the total
//! recomputation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::{CartStore, CartStoreError};
use crate::domain::{
    AbandonOutcome, CartId, CartRef, CartSnapshot, CartStatus, CheckoutOutcome, ItemRequest,
    LineItem, Product, ReplacedCart, cart_total, price_items,
};

use super::cart_snapshots::{SnapshotLoadError, load_snapshots};
use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::{CartRow, NewCartItemRow, NewCartRow, ProductRow};
use super::pool::{DbPool, PoolError};
use super::schema::{cart_items, carts, products};

/// Diesel-backed implementation of the cart store port.
#[derive(Clone)]
pub struct DieselCartStore {
    pool: DbPool,
}

impl DieselCartStore {
    /// Create a new store with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Map pool errors to domain store errors.
fn map_pool_error(error: PoolError) -> CartStoreError {
    map_basic_pool_error(error, CartStoreError::connection)
}

/// Map Diesel errors to domain store errors.
fn map_diesel_error(error: diesel::result::Error) -> CartStoreError {
    map_basic_diesel_error(error, CartStoreError::query, CartStoreError::connection)
}

fn map_snapshot_error(error: SnapshotLoadError) -> CartStoreError {
    match error {
        SnapshotLoadError::Diesel(error) => map_diesel_error(error),
        SnapshotLoadError::Decode(message) => CartStoreError::query(message),
    }
}

fn parse_status(label: &str) -> Result<CartStatus, CartStoreError> {
    label
        .parse::<CartStatus>()
        .map_err(|err| CartStoreError::query(err.to_string()))
}

async fn load_cart_row(
    conn: &mut AsyncPgConnection,
    cart_id: CartId,
) -> Result<Option<CartRow>, CartStoreError> {
    carts::table
        .filter(carts::id.eq(cart_id.as_uuid()))
        .select(CartRow::as_select())
        .first(conn)
        .await
        .optional()
        .map_err(map_diesel_error)
}

/// Newest active cart belonging to `cart_ref`.
///
/// A user identity matches on `user_ref`; a session identity additionally
/// matches carts that were never linked to a user.
async fn find_active_for_ref(
    conn: &mut AsyncPgConnection,
    cart_ref: &CartRef,
) -> QueryResult<Option<CartRow>> {
    let mut query = carts::table
        .filter(carts::status.eq(CartStatus::Active.as_str()))
        .select(CartRow::as_select())
        .order_by(carts::created_at.desc())
        .into_boxed();
    query = match (cart_ref.user_ref(), cart_ref.session_ref()) {
        (Some(user), Some(session)) => query.filter(
            carts::user_ref
                .eq(user.to_owned())
                .or(carts::user_ref.is_null().and(carts::session_ref.eq(session.to_owned()))),
        ),
        (Some(user), None) => query.filter(carts::user_ref.eq(user.to_owned())),
        (None, Some(session)) => query.filter(carts::session_ref.eq(session.to_owned())),
        (None, None) => return Ok(None),
    };
    query.first(conn).await.optional()
}

async fn load_catalogue(
    conn: &mut AsyncPgConnection,
    requests: &[ItemRequest],
) -> QueryResult<Vec<Product>> {
    let ids: Vec<Uuid> = requests
        .iter()
        .map(|request| *request.product_id.as_uuid())
        .collect();
    let rows: Vec<ProductRow> = products::table
        .filter(products::id.eq_any(ids))
        .select(ProductRow::as_select())
        .load(conn)
        .await?;
    Ok(rows.into_iter().map(Product::from).collect())
}

async fn write_items(
    conn: &mut AsyncPgConnection,
    cart_id: Uuid,
    items: &[LineItem],
    at: DateTime<Utc>,
) -> QueryResult<()> {
    diesel::delete(cart_items::table.filter(cart_items::cart_id.eq(cart_id)))
        .execute(conn)
        .await?;
    let rows = items
        .iter()
        .map(|item| NewCartItemRow::for_cart(cart_id, item, at))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|message| diesel::result::Error::QueryBuilderError(message.into()))?;
    if !rows.is_empty() {
        diesel::insert_into(cart_items::table)
            .values(&rows)
            .execute(conn)
            .await?;
    }
    Ok(())
}

#[async_trait]
impl CartStore for DieselCartStore {
    async fn find_stale_active(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<CartSnapshot>, CartStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let rows: Vec<CartRow> = carts::table
            .filter(carts::status.eq(CartStatus::Active.as_str()))
            .filter(carts::total_value.gt(Decimal::ZERO))
            .filter(carts::updated_at.lt(cutoff))
            .filter(exists(
                cart_items::table.filter(cart_items::cart_id.eq(carts::id)),
            ))
            .select(CartRow::as_select())
            .order_by(carts::updated_at.asc())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        load_snapshots(&mut conn, rows)
            .await
            .map_err(map_snapshot_error)
    }

    async fn transition_to_abandoned(
        &self,
        cart_id: CartId,
        at: DateTime<Utc>,
    ) -> Result<AbandonOutcome, CartStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let updated = diesel::update(
            carts::table
                .filter(carts::id.eq(cart_id.as_uuid()))
                .filter(carts::status.eq(CartStatus::Active.as_str())),
        )
        .set((
            carts::status.eq(CartStatus::Abandoned.as_str()),
            carts::abandoned_at.eq(Some(at)),
        ))
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;

        if updated > 0 {
            return Ok(AbandonOutcome::Abandoned { abandoned_at: at });
        }

        let row = load_cart_row(&mut conn, cart_id)
            .await?
            .ok_or_else(|| CartStoreError::not_found(cart_id.to_string()))?;
        let status = parse_status(&row.status)?;
        debug!(%cart_id, %status, "abandonment transition skipped");
        Ok(match status {
            CartStatus::Abandoned => AbandonOutcome::AlreadyAbandoned {
                abandoned_at: row.abandoned_at.unwrap_or(at),
            },
            status => AbandonOutcome::Ineligible { status },
        })
    }

    async fn replace_items(
        &self,
        cart_ref: &CartRef,
        items: &[ItemRequest],
        at: DateTime<Utc>,
    ) -> Result<ReplacedCart, CartStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        conn.transaction(|conn| {
            async move {
                let catalogue = load_catalogue(conn, items).await?;
                let priced = price_items(items, &catalogue);
                let total_value = cart_total(&priced);

                if let Some(existing) = find_active_for_ref(conn, cart_ref).await? {
                    write_items(conn, existing.id, &priced, at).await?;
                    diesel::update(carts::table.filter(carts::id.eq(existing.id)))
                        .set((
                            carts::total_value.eq(total_value),
                            carts::updated_at.eq(at),
                        ))
                        .execute(conn)
                        .await?;
                    return Ok(ReplacedCart {
                        cart_id: CartId::new(existing.id),
                        total_value,
                        created: false,
                    });
                }

                let cart_id = Uuid::new_v4();
                let new_cart = NewCartRow {
                    id: cart_id,
                    user_ref: cart_ref.user_ref(),
                    session_ref: cart_ref.session_ref(),
                    status: CartStatus::Active.as_str(),
                    total_value,
                    created_at: at,
                    updated_at: at,
                };
                diesel::insert_into(carts::table)
                    .values(&new_cart)
                    .execute(conn)
                    .await?;
                write_items(conn, cart_id, &priced, at).await?;
                Ok(ReplacedCart {
                    cart_id: CartId::new(cart_id),
                    total_value,
                    created: true,
                })
            }
            .scope_boxed()
        })
        .await
        .map_err(map_diesel_error)
    }

    async fn mark_checkout(
        &self,
        cart_id: CartId,
        outcome: CheckoutOutcome,
        at: DateTime<Utc>,
    ) -> Result<(), CartStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row = load_cart_row(&mut conn, cart_id)
            .await?
            .ok_or_else(|| CartStoreError::not_found(cart_id.to_string()))?;
        let current = parse_status(&row.status)?;
        let target = outcome.target_status();
        if current == target {
            return Ok(());
        }
        if !current.can_transition_to(target) {
            return Err(CartStoreError::invalid_transition(format!(
                "{current} -> {target}"
            )));
        }

        let updated = diesel::update(
            carts::table
                .filter(carts::id.eq(cart_id.as_uuid()))
                .filter(carts::status.eq(current.as_str())),
        )
        .set((carts::status.eq(target.as_str()), carts::updated_at.eq(at)))
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;

        if updated == 0 {
            return Err(CartStoreError::invalid_transition(format!(
                "{current} -> {target}: status changed concurrently"
            )));
        }
        Ok(())
    }

    async fn find_cart(&self, cart_id: CartId) -> Result<Option<CartSnapshot>, CartStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let Some(row) = load_cart_row(&mut conn, cart_id).await? else {
            return Ok(None);
        };
        let mut snapshots = load_snapshots(&mut conn, vec![row])
            .await
            .map_err(map_snapshot_error)?;
        Ok(snapshots.pop())
    }
}

#[cfg(test)]
mod tests {
    //! Error mapping coverage; query behaviour is exercised against a live
    //! database by the integration suite.

    use super::*;
    use rstest::rstest;

    #[rstest]
    fn pool_error_maps_to_connection_error() {
        let error = map_pool_error(PoolError::checkout("connection refused"));

        assert!(matches!(error, CartStoreError::Connection { .. }));
    }

    #[rstest]
    fn undecodable_rows_map_to_query_error() {
        let error = map_snapshot_error(SnapshotLoadError::Decode(
            "unknown cart status: archived".to_owned(),
        ));

        assert_eq!(
            error,
            CartStoreError::query("unknown cart status: archived")
        );
    }

    #[rstest]
    fn stored_status_labels_are_parsed() {
        assert_eq!(parse_status("abandoned"), Ok(CartStatus::Abandoned));
        assert!(matches!(
            parse_status("archived"),
            Err(CartStoreError::Query { .. })
        ));
    }
}
