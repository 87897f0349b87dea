//! Batch loading of carts together with their items and owner contact.
//!
//! Both adapters need `CartSnapshot`s; loading items and contacts with one
//! `eq_any` query each keeps the sweep queries at three round trips
//! regardless of how many carts are stale.

use std::collections::HashMap;

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::domain::{Cart, CartSnapshot, Contact, LineItem};

use super::models::{CartItemRow, CartRow, CustomerRow};
use super::schema::{cart_items, customers};

/// Failure while assembling snapshots.
#[derive(Debug)]
pub(crate) enum SnapshotLoadError {
    /// The follow-up queries failed.
    Diesel(diesel::result::Error),
    /// A stored row could not be decoded into a domain value.
    Decode(String),
}

impl From<diesel::result::Error> for SnapshotLoadError {
    fn from(error: diesel::result::Error) -> Self {
        Self::Diesel(error)
    }
}

/// Attach items and contacts to `rows`, preserving their order.
pub(crate) async fn load_snapshots(
    conn: &mut AsyncPgConnection,
    rows: Vec<CartRow>,
) -> Result<Vec<CartSnapshot>, SnapshotLoadError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let cart_ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
    let user_refs: Vec<&str> = rows
        .iter()
        .filter_map(|row| row.user_ref.as_deref())
        .collect();

    let item_rows: Vec<CartItemRow> = cart_items::table
        .filter(cart_items::cart_id.eq_any(cart_ids))
        .select(CartItemRow::as_select())
        .order_by((cart_items::cart_id, cart_items::added_at, cart_items::product_name))
        .load(conn)
        .await?;
    let customer_rows: Vec<CustomerRow> = if user_refs.is_empty() {
        Vec::new()
    } else {
        customers::table
            .filter(customers::user_ref.eq_any(user_refs))
            .select(CustomerRow::as_select())
            .load(conn)
            .await?
    };

    let mut items_by_cart: HashMap<Uuid, Vec<LineItem>> = HashMap::new();
    for row in item_rows {
        let cart_id = row.cart_id;
        let item = LineItem::try_from(row).map_err(SnapshotLoadError::Decode)?;
        items_by_cart.entry(cart_id).or_default().push(item);
    }
    let contacts: HashMap<String, Contact> = customer_rows
        .into_iter()
        .map(|row| (row.user_ref.clone(), Contact::from(row)))
        .collect();

    rows.into_iter()
        .map(|row| {
            let items = items_by_cart.remove(&row.id).unwrap_or_default();
            let contact = row
                .user_ref
                .as_ref()
                .and_then(|user_ref| contacts.get(user_ref))
                .cloned();
            let cart = Cart::try_from(row).map_err(SnapshotLoadError::Decode)?;
            Ok(CartSnapshot {
                cart,
                items,
                contact,
            })
        })
        .collect()
}
