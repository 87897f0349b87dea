//! Driven port for delivering recovery messages.

use async_trait::async_trait;

use super::define_port_error;
use crate::domain::recovery::OutboundMessage;

define_port_error! {
    /// Errors raised while delivering a message.
    pub enum NotifierError {
        /// Transport failed before the relay accepted the message.
        Transport { message } => "notifier transport failed: {message}",
        /// Relay refused the message or recipient.
        Rejected { message } => "notifier rejected message: {message}",
        /// Delivery did not complete in time.
        Timeout { message } => "notifier timed out: {message}",
        /// No delivery channel is configured.
        NotConfigured => "notifier not configured",
    }
}

/// Port for sending outbound recovery messages.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one message. `Ok` means the channel accepted it.
    async fn send(&self, message: &OutboundMessage) -> Result<(), NotifierError>;
}
