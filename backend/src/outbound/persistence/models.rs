//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain. Conversions into domain types report
//! undecodable rows as plain strings so each adapter can map them into its own
//! port error.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{
    AttemptId, AttemptKind, Cart, CartId, CartStatus, Contact, LineItem, Offer, OfferKind,
    Product, ProductId, RecoveryAttempt, RecoveryContent,
};

use super::schema::{cart_items, carts, customers, products, recovery_attempts};

// ---------------------------------------------------------------------------
// Catalogue and contacts
// ---------------------------------------------------------------------------

/// Row struct for reading from the products table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ProductRow {
    pub id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub stock_quantity: i32,
    pub category: Option<String>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            name: row.name,
            unit_price: row.unit_price,
            stock_quantity: row.stock_quantity,
            category: row.category,
        }
    }
}

/// Row struct for reading from the customers table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = customers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct CustomerRow {
    pub user_ref: String,
    pub email: String,
    pub display_name: Option<String>,
}

impl From<CustomerRow> for Contact {
    fn from(row: CustomerRow) -> Self {
        Self {
            email: row.email,
            display_name: row.display_name,
        }
    }
}

// ---------------------------------------------------------------------------
// Carts
// ---------------------------------------------------------------------------

/// Row struct for reading from the carts table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = carts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct CartRow {
    pub id: Uuid,
    pub user_ref: Option<String>,
    pub session_ref: Option<String>,
    pub status: String,
    pub total_value: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub abandoned_at: Option<DateTime<Utc>>,
}

impl TryFrom<CartRow> for Cart {
    type Error = String;

    fn try_from(row: CartRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<CartStatus>()
            .map_err(|err| err.to_string())?;
        Ok(Self {
            id: CartId::new(row.id),
            user_ref: row.user_ref,
            session_ref: row.session_ref,
            status,
            total_value: row.total_value,
            created_at: row.created_at,
            updated_at: row.updated_at,
            abandoned_at: row.abandoned_at,
        })
    }
}

/// Insertable struct for creating new cart records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = carts)]
pub(crate) struct NewCartRow<'a> {
    pub id: Uuid,
    pub user_ref: Option<&'a str>,
    pub session_ref: Option<&'a str>,
    pub status: &'a str,
    pub total_value: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row struct for reading from the cart_items table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = cart_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct CartItemRow {
    #[expect(dead_code, reason = "surrogate key; lines are replaced wholesale")]
    pub id: Uuid,
    pub cart_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl TryFrom<CartItemRow> for LineItem {
    type Error = String;

    fn try_from(row: CartItemRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity)
            .map_err(|_| format!("negative quantity {} on cart {}", row.quantity, row.cart_id))?;
        Ok(Self {
            product_id: ProductId::new(row.product_id),
            product_name: row.product_name,
            quantity,
            unit_price: row.unit_price,
        })
    }
}

/// Insertable struct for cart line items.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = cart_items)]
pub(crate) struct NewCartItemRow<'a> {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub product_id: Uuid,
    pub product_name: &'a str,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub added_at: DateTime<Utc>,
}

impl<'a> NewCartItemRow<'a> {
    /// Build an insertable line for `cart_id`, stamped with `added_at`.
    pub fn for_cart(
        cart_id: Uuid,
        item: &'a LineItem,
        added_at: DateTime<Utc>,
    ) -> Result<Self, String> {
        let quantity = i32::try_from(item.quantity)
            .map_err(|_| format!("quantity {} exceeds storage range", item.quantity))?;
        Ok(Self {
            id: Uuid::new_v4(),
            cart_id,
            product_id: *item.product_id.as_uuid(),
            product_name: item.product_name.as_str(),
            quantity,
            unit_price: item.unit_price,
            added_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Recovery attempts
// ---------------------------------------------------------------------------

/// Row struct for reading from the recovery_attempts table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = recovery_attempts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct RecoveryAttemptRow {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub recovery_method: String,
    pub sent_at: DateTime<Utc>,
    pub subject: String,
    pub body: String,
    pub offer_type: String,
    pub offer_value: Decimal,
    pub offer_description: String,
    pub delivered: bool,
    pub opened: bool,
    pub clicked: bool,
    pub recovered: bool,
}

impl TryFrom<RecoveryAttemptRow> for RecoveryAttempt {
    type Error = String;

    fn try_from(row: RecoveryAttemptRow) -> Result<Self, Self::Error> {
        let kind = row
            .recovery_method
            .parse::<AttemptKind>()
            .map_err(|err| err.to_string())?;
        let offer_kind = row
            .offer_type
            .parse::<OfferKind>()
            .map_err(|err| err.to_string())?;
        Ok(Self {
            id: AttemptId::new(row.id),
            cart_id: CartId::new(row.cart_id),
            kind,
            sent_at: row.sent_at,
            content: RecoveryContent {
                subject: row.subject,
                body: row.body,
            },
            offer: Offer {
                kind: offer_kind,
                value: row.offer_value,
                description: row.offer_description,
            },
            delivered: row.delivered,
            opened: row.opened,
            clicked: row.clicked,
            recovered: row.recovered,
        })
    }
}

/// Insertable struct for appending ledger entries.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = recovery_attempts)]
pub(crate) struct NewRecoveryAttemptRow<'a> {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub recovery_method: &'a str,
    pub sent_at: DateTime<Utc>,
    pub subject: &'a str,
    pub body: &'a str,
    pub offer_type: &'a str,
    pub offer_value: Decimal,
    pub offer_description: &'a str,
}

#[cfg(test)]
mod tests {
    //! Row conversion coverage for cart lines.

    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn line(quantity: u32) -> LineItem {
        LineItem {
            product_id: ProductId::new(Uuid::new_v4()),
            product_name: "Desk lamp".to_owned(),
            quantity,
            unit_price: Decimal::new(3000, 2),
        }
    }

    #[rstest]
    fn new_lines_carry_the_write_instant() {
        let at = Utc
            .with_ymd_and_hms(2026, 5, 4, 10, 0, 0)
            .single()
            .expect("valid time");
        let cart_id = Uuid::new_v4();
        let item = line(2);

        let row = NewCartItemRow::for_cart(cart_id, &item, at).expect("row builds");

        assert_eq!(row.cart_id, cart_id);
        assert_eq!(row.added_at, at);
        assert_eq!(row.quantity, 2);
    }

    #[rstest]
    fn oversized_quantities_are_rejected() {
        let item = line(u32::MAX);

        assert!(NewCartItemRow::for_cart(Uuid::new_v4(), &item, Utc::now()).is_err());
    }
}
