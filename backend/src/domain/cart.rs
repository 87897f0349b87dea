//! Cart aggregate, priced line items, and the cart lifecycle state machine.
//!
//! Carts move `active -> abandoned -> {recovered | completed}`; an active cart
//! may also complete directly through checkout. There is no path back to
//! `active`: a shopper who returns after abandonment starts a fresh cart.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_CUSTOMER_NAME: &str = "Valued Customer";
const DEFAULT_ITEMS_SUMMARY: &str = "your selected items";

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Wrap an existing UUID.
            pub const fn new(id: Uuid) -> Self {
                Self(id)
            }

            /// Generate a fresh random identifier.
            pub fn random() -> Self {
                Self(Uuid::new_v4())
            }

            /// Borrow the underlying UUID.
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }
    };
}

pub(crate) use uuid_identifier;

uuid_identifier! {
    /// Opaque cart identifier.
    CartId
}

uuid_identifier! {
    /// Catalogue product identifier.
    ProductId
}

/// Lifecycle status of a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartStatus {
    /// Shopper is still building the cart.
    Active,
    /// Inactive past the abandonment threshold with a non-zero value.
    Abandoned,
    /// Checked out after recovery outreach.
    Recovered,
    /// Checked out without recovery involvement.
    Completed,
}

impl CartStatus {
    /// Stable storage label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Abandoned => "abandoned",
            Self::Recovered => "recovered",
            Self::Completed => "completed",
        }
    }

    /// Terminal states are owned by checkout, not by this engine.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Recovered | Self::Completed)
    }

    /// Whether the lifecycle permits moving from `self` to `next`.
    ///
    /// # Examples
    /// ```
    /// use cart_recovery::domain::CartStatus;
    ///
    /// assert!(CartStatus::Active.can_transition_to(CartStatus::Abandoned));
    /// assert!(!CartStatus::Abandoned.can_transition_to(CartStatus::Active));
    /// ```
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Abandoned)
                | (Self::Abandoned, Self::Recovered)
                | (Self::Active | Self::Abandoned, Self::Completed)
        )
    }
}

impl fmt::Display for CartStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a stored status label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown cart status: {0}")]
pub struct UnknownCartStatus(pub String);

impl FromStr for CartStatus {
    type Err = UnknownCartStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "abandoned" => Ok(Self::Abandoned),
            "recovered" => Ok(Self::Recovered),
            "completed" => Ok(Self::Completed),
            other => Err(UnknownCartStatus(other.to_owned())),
        }
    }
}

/// Validation failures for [`CartRef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CartRefError {
    /// Neither a user nor a session identity was supplied.
    #[error("cart reference requires a user or session identity")]
    MissingIdentity,
}

/// Identity used by the request layer to resolve a shopper's cart.
///
/// ## Invariants
/// - At least one of `user_ref` and `session_ref` is present and non-blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CartRef {
    user_ref: Option<String>,
    session_ref: Option<String>,
}

impl CartRef {
    /// Build a reference, trimming blanks to `None`.
    ///
    /// # Errors
    ///
    /// Returns [`CartRefError::MissingIdentity`] when both identities are
    /// absent or blank.
    ///
    /// # Examples
    /// ```
    /// use cart_recovery::domain::{CartRef, CartRefError};
    ///
    /// let cart_ref = CartRef::new(None, Some("sess-1".to_owned()))?;
    /// assert_eq!(cart_ref.session_ref(), Some("sess-1"));
    /// assert_eq!(
    ///     CartRef::new(Some("  ".to_owned()), None),
    ///     Err(CartRefError::MissingIdentity)
    /// );
    /// # Ok::<(), CartRefError>(())
    /// ```
    pub fn new(user_ref: Option<String>, session_ref: Option<String>) -> Result<Self, CartRefError> {
        let user_ref = normalise(user_ref);
        let session_ref = normalise(session_ref);
        if user_ref.is_none() && session_ref.is_none() {
            return Err(CartRefError::MissingIdentity);
        }
        Ok(Self {
            user_ref,
            session_ref,
        })
    }

    /// Reference an anonymous session cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartRefError::MissingIdentity`] for a blank session id.
    pub fn for_session(session_ref: impl Into<String>) -> Result<Self, CartRefError> {
        Self::new(None, Some(session_ref.into()))
    }

    /// Reference a signed-in user's cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartRefError::MissingIdentity`] for a blank user id.
    pub fn for_user(user_ref: impl Into<String>) -> Result<Self, CartRefError> {
        Self::new(Some(user_ref.into()), None)
    }

    /// Signed-in user identity, when present.
    pub fn user_ref(&self) -> Option<&str> {
        self.user_ref.as_deref()
    }

    /// Anonymous session identity, when present.
    pub fn session_ref(&self) -> Option<&str> {
        self.session_ref.as_deref()
    }

    /// Whether `cart` belongs to this reference. User identity wins when both
    /// sides carry one.
    pub fn matches(&self, cart: &Cart) -> bool {
        match (self.user_ref(), cart.user_ref.as_deref()) {
            (Some(wanted), Some(actual)) => wanted == actual,
            _ => self
                .session_ref()
                .is_some_and(|wanted| cart.session_ref.as_deref() == Some(wanted)),
        }
    }
}

fn normalise(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_owned())
        .filter(|trimmed| !trimmed.is_empty())
}

/// A requested cart line before pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemRequest {
    /// Catalogue product being added.
    pub product_id: ProductId,
    /// Requested quantity.
    pub quantity: u32,
}

/// Read-only catalogue entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    /// Catalogue identifier.
    pub id: ProductId,
    /// Display name used in outreach content.
    pub name: String,
    /// Current unit price.
    pub unit_price: Decimal,
    /// Units in stock.
    pub stock_quantity: i32,
    /// Optional merchandising category.
    pub category: Option<String>,
}

/// A priced cart line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    /// Catalogue product.
    pub product_id: ProductId,
    /// Product name captured for outreach content.
    pub product_name: String,
    /// Units in the cart.
    pub quantity: u32,
    /// Unit price captured when the line was written.
    pub unit_price: Decimal,
}

impl LineItem {
    /// `unit_price × quantity`.
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Sum of line totals; the only valid value for `Cart::total_value`.
///
/// # Examples
/// ```
/// use cart_recovery::domain::{LineItem, ProductId, cart_total};
/// use rust_decimal::Decimal;
///
/// let items = vec![LineItem {
///     product_id: ProductId::random(),
///     product_name: "Yoga Mat".to_owned(),
///     quantity: 2,
///     unit_price: Decimal::new(3999, 2),
/// }];
/// assert_eq!(cart_total(&items), Decimal::new(7998, 2));
/// ```
pub fn cart_total(items: &[LineItem]) -> Decimal {
    items.iter().map(LineItem::line_total).sum()
}

/// Price requested lines against the catalogue.
///
/// Unknown products and zero quantities are dropped, so they never reach the
/// stored item set or the cart total.
pub fn price_items(requests: &[ItemRequest], catalogue: &[Product]) -> Vec<LineItem> {
    requests
        .iter()
        .filter(|request| request.quantity > 0)
        .filter_map(|request| {
            catalogue
                .iter()
                .find(|product| product.id == request.product_id)
                .map(|product| LineItem {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    quantity: request.quantity,
                    unit_price: product.unit_price,
                })
        })
        .collect()
}

/// Persisted cart record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    /// Cart identifier.
    pub id: CartId,
    /// Linked user identity, if signed in.
    pub user_ref: Option<String>,
    /// Linked anonymous session, if any.
    pub session_ref: Option<String>,
    /// Lifecycle status.
    pub status: CartStatus,
    /// Sum of current line totals.
    pub total_value: Decimal,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Last item mutation; drives abandonment detection.
    pub updated_at: DateTime<Utc>,
    /// Set once, on entering `abandoned`.
    pub abandoned_at: Option<DateTime<Utc>>,
}

/// Where outreach for a cart is delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    /// Delivery address.
    pub email: String,
    /// Greeting name, when known.
    pub display_name: Option<String>,
}

/// A cart together with its items and owner contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSnapshot {
    /// Cart record.
    pub cart: Cart,
    /// Current line items.
    pub items: Vec<LineItem>,
    /// Owner contact; anonymous carts have none.
    pub contact: Option<Contact>,
}

impl CartSnapshot {
    /// Name used to greet the shopper.
    pub fn customer_name(&self) -> &str {
        self.contact
            .as_ref()
            .and_then(|contact| contact.display_name.as_deref())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_CUSTOMER_NAME)
    }

    /// Human-readable item list, e.g. `Smartphone (1), Yoga Mat (2)`.
    pub fn items_summary(&self) -> String {
        if self.items.is_empty() {
            return DEFAULT_ITEMS_SUMMARY.to_owned();
        }
        self.items
            .iter()
            .map(|item| format!("{} ({})", item.product_name, item.quantity))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Delivery address, when the cart is linked to a contactable user.
    pub fn contact_email(&self) -> Option<&str> {
        self.contact
            .as_ref()
            .map(|contact| contact.email.trim())
            .filter(|email| !email.is_empty())
    }
}

/// Result of an abandonment transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonOutcome {
    /// The cart moved from `active` to `abandoned`.
    Abandoned {
        /// Instant recorded on the cart.
        abandoned_at: DateTime<Utc>,
    },
    /// The cart was already abandoned; nothing changed.
    AlreadyAbandoned {
        /// Instant recorded by the original transition.
        abandoned_at: DateTime<Utc>,
    },
    /// The cart reached a terminal state first; nothing changed.
    Ineligible {
        /// Status observed on the cart.
        status: CartStatus,
    },
}

/// Result of a wholesale item replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplacedCart {
    /// Cart that now holds the items.
    pub cart_id: CartId,
    /// Recomputed total.
    pub total_value: Decimal,
    /// Whether a new cart was created for the reference.
    pub created: bool,
}

/// Terminal checkout event reported by the request layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Purchase completed after recovery outreach.
    Recovered,
    /// Purchase completed without recovery involvement.
    Completed,
}

impl CheckoutOutcome {
    /// Status the cart moves to.
    pub const fn target_status(self) -> CartStatus {
        match self {
            Self::Recovered => CartStatus::Recovered,
            Self::Completed => CartStatus::Completed,
        }
    }
}

#[cfg(test)]
mod tests {
    //! Lifecycle and pricing rules for carts.

    use super::*;
    use rstest::rstest;

    fn product(name: &str, cents: i64) -> Product {
        Product {
            id: ProductId::random(),
            name: name.to_owned(),
            unit_price: Decimal::new(cents, 2),
            stock_quantity: 10,
            category: None,
        }
    }

    fn cart(user_ref: Option<&str>, session_ref: Option<&str>) -> Cart {
        let now = Utc::now();
        Cart {
            id: CartId::random(),
            user_ref: user_ref.map(str::to_owned),
            session_ref: session_ref.map(str::to_owned),
            status: CartStatus::Active,
            total_value: Decimal::ZERO,
            created_at: now,
            updated_at: now,
            abandoned_at: None,
        }
    }

    #[rstest]
    #[case(CartStatus::Active, CartStatus::Abandoned, true)]
    #[case(CartStatus::Active, CartStatus::Completed, true)]
    #[case(CartStatus::Abandoned, CartStatus::Recovered, true)]
    #[case(CartStatus::Abandoned, CartStatus::Completed, true)]
    #[case(CartStatus::Abandoned, CartStatus::Active, false)]
    #[case(CartStatus::Active, CartStatus::Recovered, false)]
    #[case(CartStatus::Recovered, CartStatus::Completed, false)]
    #[case(CartStatus::Completed, CartStatus::Abandoned, false)]
    fn lifecycle_transitions(
        #[case] from: CartStatus,
        #[case] to: CartStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[rstest]
    #[case("active", CartStatus::Active)]
    #[case("abandoned", CartStatus::Abandoned)]
    #[case("recovered", CartStatus::Recovered)]
    #[case("completed", CartStatus::Completed)]
    fn status_labels_parse(#[case] label: &str, #[case] status: CartStatus) {
        assert_eq!(label.parse::<CartStatus>(), Ok(status));
        assert_eq!(status.as_str(), label);
    }

    #[test]
    fn unknown_status_label_is_rejected() {
        assert_eq!(
            "archived".parse::<CartStatus>(),
            Err(UnknownCartStatus("archived".to_owned()))
        );
    }

    #[test]
    fn pricing_drops_unknown_products_and_zero_quantities() {
        let headphones = product("Wireless Headphones", 19_999);
        let mat = product("Yoga Mat", 3_999);
        let catalogue = vec![headphones.clone(), mat.clone()];
        let requests = [
            ItemRequest {
                product_id: headphones.id,
                quantity: 1,
            },
            ItemRequest {
                product_id: ProductId::random(),
                quantity: 4,
            },
            ItemRequest {
                product_id: mat.id,
                quantity: 0,
            },
        ];

        let items = price_items(&requests, &catalogue);

        assert_eq!(items.len(), 1);
        assert_eq!(cart_total(&items), Decimal::new(19_999, 2));
    }

    #[test]
    fn total_is_sum_of_line_totals() {
        let items = vec![
            LineItem {
                product_id: ProductId::random(),
                product_name: "Gaming Mouse".to_owned(),
                quantity: 2,
                unit_price: Decimal::new(8_999, 2),
            },
            LineItem {
                product_id: ProductId::random(),
                product_name: "Yoga Mat".to_owned(),
                quantity: 3,
                unit_price: Decimal::new(3_999, 2),
            },
        ];
        assert_eq!(cart_total(&items), Decimal::new(29_995, 2));
        assert_eq!(cart_total(&[]), Decimal::ZERO);
    }

    #[test]
    fn cart_ref_prefers_user_identity() {
        let cart_ref =
            CartRef::new(Some("user-1".to_owned()), Some("sess-1".to_owned())).expect("valid ref");
        assert!(cart_ref.matches(&cart(Some("user-1"), Some("other"))));
        assert!(!cart_ref.matches(&cart(Some("user-2"), Some("sess-1"))));
        assert!(cart_ref.matches(&cart(None, Some("sess-1"))));
    }

    #[test]
    fn blank_identities_are_rejected() {
        assert_eq!(
            CartRef::new(Some(" ".to_owned()), Some(String::new())),
            Err(CartRefError::MissingIdentity)
        );
    }

    #[test]
    fn snapshot_defaults_for_anonymous_carts() {
        let snapshot = CartSnapshot {
            cart: cart(None, Some("sess")),
            items: Vec::new(),
            contact: None,
        };
        assert_eq!(snapshot.customer_name(), "Valued Customer");
        assert_eq!(snapshot.items_summary(), "your selected items");
        assert!(snapshot.contact_email().is_none());
    }

    #[test]
    fn snapshot_summarises_items() {
        let snapshot = CartSnapshot {
            cart: cart(Some("user-1"), None),
            items: vec![
                LineItem {
                    product_id: ProductId::random(),
                    product_name: "Smartphone".to_owned(),
                    quantity: 1,
                    unit_price: Decimal::new(79_999, 2),
                },
                LineItem {
                    product_id: ProductId::random(),
                    product_name: "Yoga Mat".to_owned(),
                    quantity: 2,
                    unit_price: Decimal::new(3_999, 2),
                },
            ],
            contact: Some(Contact {
                email: "ada@example.com".to_owned(),
                display_name: Some("Ada Lovelace".to_owned()),
            }),
        };
        assert_eq!(snapshot.items_summary(), "Smartphone (1), Yoga Mat (2)");
        assert_eq!(snapshot.customer_name(), "Ada Lovelace");
        assert_eq!(snapshot.contact_email(), Some("ada@example.com"));
    }
}
