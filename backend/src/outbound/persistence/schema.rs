//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match the database migrations exactly. They are used
//! by Diesel for compile-time query validation and type-safe SQL generation.
//!
//! # Maintenance
//!
//! When migrations change the schema, this file should be regenerated or
//! manually updated to reflect those changes. The `diesel print-schema`
//! command can generate these definitions from a live database.

diesel::table! {
    /// Read-only product catalogue used to price cart lines.
    products (id) {
        /// Primary key: UUID v4 identifier.
        id -> Uuid,
        /// Display name copied into cart lines and outreach content.
        name -> Varchar,
        /// Current unit price.
        unit_price -> Numeric,
        /// Units in stock.
        stock_quantity -> Int4,
        /// Optional merchandising category.
        category -> Nullable<Varchar>,
    }
}

diesel::table! {
    /// Contact details for signed-in shoppers, keyed by the external user
    /// identity carried on carts.
    customers (user_ref) {
        /// External user identity.
        user_ref -> Varchar,
        /// Delivery address for recovery outreach.
        email -> Varchar,
        /// Greeting name, when known.
        display_name -> Nullable<Varchar>,
    }
}

diesel::table! {
    /// Shopping carts and their lifecycle status.
    ///
    /// `status` is constrained to `active`, `abandoned`, `recovered` and
    /// `completed` by a CHECK constraint.
    carts (id) {
        /// Primary key: UUID v4 identifier.
        id -> Uuid,
        /// Linked user identity, if signed in.
        user_ref -> Nullable<Varchar>,
        /// Linked anonymous session, if any.
        session_ref -> Nullable<Varchar>,
        /// Lifecycle status label.
        status -> Varchar,
        /// Sum of current line totals.
        total_value -> Numeric,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last item mutation; drives abandonment detection.
        updated_at -> Timestamptz,
        /// Set once, on entering `abandoned`.
        abandoned_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Current line items per cart. Replaced wholesale on every mutation.
    cart_items (id) {
        /// Primary key: UUID v4 identifier.
        id -> Uuid,
        /// Owning cart (FK to carts.id, cascades on delete).
        cart_id -> Uuid,
        /// Catalogue product (FK to products.id).
        product_id -> Uuid,
        /// Product name captured when the line was written.
        product_name -> Varchar,
        /// Units in the cart (always positive).
        quantity -> Int4,
        /// Unit price captured when the line was written.
        unit_price -> Numeric,
        /// Instant the line was written.
        added_at -> Timestamptz,
    }
}

diesel::table! {
    /// Append-only ledger of recovery outreach.
    recovery_attempts (id) {
        /// Primary key: UUID v4 identifier.
        id -> Uuid,
        /// Targeted cart (FK to carts.id).
        cart_id -> Uuid,
        /// Ladder position: `email` or `follow_up_email`.
        recovery_method -> Varchar,
        /// Instant the attempt was issued.
        sent_at -> Timestamptz,
        /// Message subject line.
        subject -> Text,
        /// Plain-text message body.
        body -> Text,
        /// Offer kind label.
        offer_type -> Varchar,
        /// Offer magnitude.
        offer_value -> Numeric,
        /// Offer description rendered into the message.
        offer_description -> Text,
        /// The notifier accepted the message.
        delivered -> Bool,
        /// Tracking saw the message opened.
        opened -> Bool,
        /// Tracking saw the checkout link clicked.
        clicked -> Bool,
        /// The cart converted after this attempt.
        recovered -> Bool,
    }
}

diesel::joinable!(cart_items -> carts (cart_id));
diesel::joinable!(cart_items -> products (product_id));
diesel::joinable!(recovery_attempts -> carts (cart_id));

diesel::allow_tables_to_appear_in_same_query!(
    cart_items,
    carts,
    customers,
    products,
    recovery_attempts,
);
