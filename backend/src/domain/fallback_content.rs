//! Deterministic template content used whenever the generator cannot answer.

use super::recovery::{CartContext, RecoveryContent};

/// Subject prefix marking escalated follow-ups.
pub const FOLLOW_UP_SUBJECT_PREFIX: &str = "Last chance: ";

/// Fill the fallback template from cart facts.
///
/// # Examples
/// ```
/// use cart_recovery::domain::{CartContext, CartId, fallback_content};
/// use rust_decimal::Decimal;
///
/// let content = fallback_content(&CartContext {
///     cart_id: CartId::random(),
///     customer_name: "Ada".to_owned(),
///     items_summary: "Smartphone (1)".to_owned(),
///     total_value: Decimal::new(79_999, 2),
/// });
/// assert_eq!(content.subject, "Complete your purchase, Ada!");
/// assert!(content.body.contains("Total: $799.99"));
/// ```
pub fn fallback_content(context: &CartContext) -> RecoveryContent {
    let CartContext {
        customer_name,
        items_summary,
        total_value,
        ..
    } = context;
    RecoveryContent {
        subject: format!("Complete your purchase, {customer_name}!"),
        body: format!(
            "Hi {customer_name},\n\nYou have {items_summary} waiting in your cart. \
             Complete your purchase now!\n\nTotal: ${:.2}",
            total_value.round_dp(2)
        ),
    }
}

/// Frame follow-up content with urgency.
pub fn follow_up_content(content: RecoveryContent) -> RecoveryContent {
    if content.subject.starts_with(FOLLOW_UP_SUBJECT_PREFIX) {
        return content;
    }
    RecoveryContent {
        subject: format!("{FOLLOW_UP_SUBJECT_PREFIX}{}", content.subject),
        body: content.body,
    }
}

#[cfg(test)]
mod tests {
    //! Template rendering.

    use super::*;
    use crate::domain::CartId;
    use rust_decimal::Decimal;

    fn context() -> CartContext {
        CartContext {
            cart_id: CartId::random(),
            customer_name: "Valued Customer".to_owned(),
            items_summary: "Coffee Maker (1)".to_owned(),
            total_value: Decimal::new(14_999, 2),
        }
    }

    #[test]
    fn fallback_mentions_items_and_total() {
        let content = fallback_content(&context());
        assert_eq!(content.subject, "Complete your purchase, Valued Customer!");
        assert!(content.body.contains("Coffee Maker (1)"));
        assert!(content.body.ends_with("Total: $149.99"));
    }

    #[test]
    fn follow_up_prefix_is_applied_once() {
        let framed = follow_up_content(follow_up_content(fallback_content(&context())));
        assert_eq!(
            framed.subject,
            "Last chance: Complete your purchase, Valued Customer!"
        );
    }
}
