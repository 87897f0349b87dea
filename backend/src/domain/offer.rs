//! Promotional offers and the escalation ladder used for follow-ups.
//!
//! A follow-up offer is never less generous than the offer it follows and
//! never exceeds the configured percentage ceiling.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const HIGH_VALUE_FLOOR: Decimal = Decimal::from_parts(200, 0, 0, false, 0);
const MEDIUM_VALUE_FLOOR: Decimal = Decimal::from_parts(100, 0, 0, false, 0);
const HIGH_VALUE_DISCOUNT: Decimal = Decimal::from_parts(15, 0, 0, false, 0);
const MEDIUM_VALUE_DISCOUNT: Decimal = Decimal::from_parts(10, 0, 0, false, 0);

/// Kind of incentive attached to a recovery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferKind {
    /// Percentage off the order; `value` is the percentage.
    PercentageDiscount,
    /// Free shipping; `value` is zero.
    FreeShipping,
}

impl OfferKind {
    /// Stable storage label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PercentageDiscount => "percentage_discount",
            Self::FreeShipping => "free_shipping",
        }
    }
}

impl fmt::Display for OfferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a stored or generated offer label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown offer type: {0}")]
pub struct UnknownOfferKind(pub String);

impl FromStr for OfferKind {
    type Err = UnknownOfferKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "percentage_discount" | "percentage" | "discount" => Ok(Self::PercentageDiscount),
            "free_shipping" => Ok(Self::FreeShipping),
            other => Err(UnknownOfferKind(other.to_owned())),
        }
    }
}

/// A promotional offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    /// Incentive kind.
    pub kind: OfferKind,
    /// Percentage for discounts; zero for free shipping.
    pub value: Decimal,
    /// Copy shown to the shopper.
    pub description: String,
}

impl Offer {
    /// Build a percentage discount with standard copy.
    pub fn percentage(value: Decimal) -> Self {
        let value = value.normalize();
        Self {
            kind: OfferKind::PercentageDiscount,
            value,
            description: format!("{value}% off your entire order!"),
        }
    }

    /// Build a free-shipping offer with standard copy.
    pub fn free_shipping() -> Self {
        Self {
            kind: OfferKind::FreeShipping,
            value: Decimal::ZERO,
            description: "Free Shipping on your order!".to_owned(),
        }
    }

    /// Comparable generosity: the discount percentage, zero for free shipping.
    pub fn generosity(&self) -> Decimal {
        match self.kind {
            OfferKind::PercentageDiscount => self.value,
            OfferKind::FreeShipping => Decimal::ZERO,
        }
    }
}

/// Offer tiers, clamping, and the follow-up escalation ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfferPolicy {
    ceiling: Decimal,
    step: Decimal,
}

impl OfferPolicy {
    /// Build a policy. Negative inputs are treated as zero and the step never
    /// exceeds the ceiling.
    pub fn new(ceiling: Decimal, step: Decimal) -> Self {
        let ceiling = ceiling.max(Decimal::ZERO);
        Self {
            ceiling,
            step: step.max(Decimal::ZERO).min(ceiling),
        }
    }

    /// Maximum discount percentage.
    pub const fn ceiling(&self) -> Decimal {
        self.ceiling
    }

    /// Increment applied on each follow-up.
    pub const fn step(&self) -> Decimal {
        self.step
    }

    /// Deterministic tiered offer by cart value.
    ///
    /// # Examples
    /// ```
    /// use cart_recovery::domain::{OfferKind, OfferPolicy};
    /// use rust_decimal::Decimal;
    ///
    /// let policy = OfferPolicy::new(Decimal::from(25), Decimal::from(5));
    /// let offer = policy.tier_offer(Decimal::from(150));
    /// assert_eq!(offer.kind, OfferKind::PercentageDiscount);
    /// assert_eq!(offer.value, Decimal::from(10));
    /// ```
    pub fn tier_offer(&self, cart_value: Decimal) -> Offer {
        let offer = if cart_value > HIGH_VALUE_FLOOR {
            Offer::percentage(HIGH_VALUE_DISCOUNT)
        } else if cart_value > MEDIUM_VALUE_FLOOR {
            Offer {
                description: "10% off + Free Shipping!".to_owned(),
                ..Offer::percentage(MEDIUM_VALUE_DISCOUNT)
            }
        } else {
            Offer::free_shipping()
        };
        self.clamp(offer)
    }

    /// Bring an externally suggested offer inside the policy bounds.
    pub fn clamp(&self, offer: Offer) -> Offer {
        match offer.kind {
            OfferKind::FreeShipping if offer.value != Decimal::ZERO => Offer {
                value: Decimal::ZERO,
                ..offer
            },
            OfferKind::PercentageDiscount if offer.value > self.ceiling => {
                Offer::percentage(self.ceiling)
            }
            OfferKind::PercentageDiscount if offer.value < Decimal::ZERO => Offer::free_shipping(),
            _ => offer,
        }
    }

    /// Next rung on the ladder above `previous`.
    ///
    /// Discounts grow by the step up to the ceiling; free shipping becomes a
    /// one-step discount. At the ceiling the offer holds its value.
    pub fn escalate(&self, previous: &Offer) -> Offer {
        let base = previous.generosity();
        let raised = (base + self.step).min(self.ceiling).max(base);
        Offer::percentage(raised)
    }

    /// Follow-up offer given the previous offer and an optional suggestion.
    ///
    /// The suggestion is clamped; whichever of it and `previous` is more
    /// generous is escalated one rung.
    ///
    /// # Examples
    /// ```
    /// use cart_recovery::domain::{Offer, OfferPolicy};
    /// use rust_decimal::Decimal;
    ///
    /// let policy = OfferPolicy::new(Decimal::from(25), Decimal::from(5));
    /// let previous = Offer::percentage(Decimal::from(10));
    /// let next = policy.follow_up_offer(&previous, None);
    /// assert_eq!(next.value, Decimal::from(15));
    /// ```
    pub fn follow_up_offer(&self, previous: &Offer, suggestion: Option<Offer>) -> Offer {
        let clamped = suggestion.map(|offer| self.clamp(offer));
        let base = match clamped {
            Some(candidate) if candidate.generosity() > previous.generosity() => candidate,
            _ => previous.clone(),
        };
        self.escalate(&base)
    }
}
