//! Notifier outbound adapters.
//!
//! `SmtpNotifier` relays recovery messages over STARTTLS SMTP. The
//! `LoggingNotifier` stands in when no SMTP credentials are configured.

mod logging;
mod smtp;

pub use logging::LoggingNotifier;
pub use smtp::{SmtpNotifier, SmtpSettings};
