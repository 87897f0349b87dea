//! Notifier used when no delivery channel is configured.

use async_trait::async_trait;
use tracing::info;

use crate::domain::OutboundMessage;
use crate::domain::ports::{Notifier, NotifierError};

/// Logs each message and reports it as undelivered.
///
/// Attempts stay recorded with `delivered = false`, so configuring SMTP later
/// does not resend them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn send(&self, message: &OutboundMessage) -> Result<(), NotifierError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            "smtp not configured; recovery message not sent"
        );
        Err(NotifierError::not_configured())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_not_configured() {
        let message = OutboundMessage {
            to: "ada@example.com".to_owned(),
            subject: "Complete your purchase, Ada!".to_owned(),
            body: "Hi Ada".to_owned(),
        };

        let result = LoggingNotifier.send(&message).await;

        assert_eq!(result, Err(NotifierError::NotConfigured));
    }
}
