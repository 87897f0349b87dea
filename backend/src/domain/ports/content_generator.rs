//! Driven port for personalised outreach content and offer suggestions.
//!
//! Generators are advisory. The scheduler bounds every call with a timeout
//! and substitutes template content or tiered offers on any failure.

use async_trait::async_trait;

use super::define_port_error;
use crate::domain::offer::Offer;
use crate::domain::recovery::{CartContext, RecoveryContent};

define_port_error! {
    /// Errors raised by content generators.
    pub enum ContentGeneratorError {
        /// Upstream service could not be reached or returned an error status.
        Unavailable { message } => "content generator unavailable: {message}",
        /// Upstream service did not answer in time.
        Timeout { message } => "content generator timed out: {message}",
        /// Reply could not be interpreted as content or an offer.
        Malformed { message } => "content generator reply malformed: {message}",
        /// No generator is configured.
        Disabled => "content generator disabled",
    }
}

/// Port for generating recovery copy and suggesting offers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Personalised subject and body for a cart.
    async fn generate(&self, context: &CartContext)
    -> Result<RecoveryContent, ContentGeneratorError>;

    /// Suggest an offer for a cart given earlier offers, oldest first.
    ///
    /// The caller clamps the suggestion into policy bounds.
    async fn suggest_offer(
        &self,
        context: &CartContext,
        previous: &[Offer],
    ) -> Result<Offer, ContentGeneratorError>;
}

/// Generator used when no content service is configured.
///
/// Every call fails with [`ContentGeneratorError::Disabled`], so outreach uses
/// template content and tiered offers.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledContentGenerator;

#[async_trait]
impl ContentGenerator for DisabledContentGenerator {
    async fn generate(
        &self,
        _context: &CartContext,
    ) -> Result<RecoveryContent, ContentGeneratorError> {
        Err(ContentGeneratorError::disabled())
    }

    async fn suggest_offer(
        &self,
        _context: &CartContext,
        _previous: &[Offer],
    ) -> Result<Offer, ContentGeneratorError> {
        Err(ContentGeneratorError::disabled())
    }
}
