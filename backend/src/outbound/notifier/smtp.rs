//! Lettre-backed SMTP notifier.
//!
//! The transport is built once and reused; lettre pools SMTP connections
//! internally. Permanent (5xx) replies map to `Rejected`, everything else
//! that fails before acceptance maps to `Transport` or `Timeout`.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use crate::domain::OutboundMessage;
use crate::domain::ports::{Notifier, NotifierError};

/// Connection settings for the SMTP relay.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    /// Relay host name.
    pub host: String,
    /// Relay port, usually 587 for STARTTLS.
    pub port: u16,
    /// Login user.
    pub username: String,
    /// Login password.
    pub password: String,
    /// Sender address, e.g. `Shop <noreply@shop.example>`.
    pub from_email: String,
    /// Per-command timeout.
    pub timeout: Duration,
}

/// Notifier that relays messages over STARTTLS SMTP.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    /// Build the notifier and its SMTP transport.
    ///
    /// # Errors
    ///
    /// Returns [`NotifierError::Transport`] when the relay host cannot be
    /// resolved into a TLS transport, or [`NotifierError::Rejected`] when the
    /// sender address does not parse.
    pub fn new(settings: SmtpSettings) -> Result<Self, NotifierError> {
        let from = parse_mailbox(&settings.from_email)?;
        let credentials = Credentials::new(settings.username, settings.password);
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|err| NotifierError::transport(err.to_string()))?
            .port(settings.port)
            .credentials(credentials)
            .timeout(Some(settings.timeout))
            .build();
        Ok(Self { transport, from })
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifierError> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|err| NotifierError::rejected(format!("invalid address {address:?}: {err}")))
}

fn build_message(from: &Mailbox, message: &OutboundMessage) -> Result<Message, NotifierError> {
    let to = parse_mailbox(&message.to)?;
    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(message.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(message.body.clone())
        .map_err(|err| NotifierError::rejected(err.to_string()))
}

fn map_smtp_error(error: &lettre::transport::smtp::Error) -> NotifierError {
    if error.is_timeout() {
        NotifierError::timeout(error.to_string())
    } else if error.is_permanent() {
        NotifierError::rejected(error.to_string())
    } else {
        NotifierError::transport(error.to_string())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, message: &OutboundMessage) -> Result<(), NotifierError> {
        let email = build_message(&self.from, message)?;
        let response = self
            .transport
            .send(email)
            .await
            .map_err(|err| map_smtp_error(&err))?;
        debug!(to = %message.to, code = %response.code(), "smtp relay accepted message");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Message construction; relay behaviour is not exercised without a
    //! server.

    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn sender() -> Mailbox {
        parse_mailbox("Shop <noreply@shop.example>").expect("sender parses")
    }

    fn message(to: &str) -> OutboundMessage {
        OutboundMessage {
            to: to.to_owned(),
            subject: "Complete your purchase, Ada!".to_owned(),
            body: "Hi Ada,\n\nComplete your purchase: https://shop.example/checkout/1".to_owned(),
        }
    }

    #[rstest]
    fn builds_plain_text_message(sender: Mailbox) {
        let email = build_message(&sender, &message("ada@example.com")).expect("message builds");
        let raw = String::from_utf8(email.formatted()).expect("utf-8 message");

        assert!(raw.contains("Subject: Complete your purchase, Ada!"));
        assert!(raw.contains("To: ada@example.com"));
        assert!(raw.contains("Content-Type: text/plain"));
    }

    #[rstest]
    #[case::missing_at("ada.example.com")]
    #[case::blank("   ")]
    fn invalid_recipient_is_rejected(sender: Mailbox, #[case] to: &str) {
        let error = build_message(&sender, &message(to)).expect_err("recipient invalid");

        assert!(matches!(error, NotifierError::Rejected { .. }));
    }

    #[rstest]
    fn invalid_sender_fails_construction() {
        let result = SmtpNotifier::new(SmtpSettings {
            host: "smtp.example.com".to_owned(),
            port: 587,
            username: "user".to_owned(),
            password: "secret".to_owned(),
            from_email: "not an address".to_owned(),
            timeout: Duration::from_secs(10),
        });

        assert!(matches!(result, Err(NotifierError::Rejected { .. })));
    }
}
