//! Process settings loaded via OrthoConfig.
//!
//! Values come from CLI flags, `CART_RECOVERY_*` environment variables, and
//! an optional configuration file. The domain never sees these raw values:
//! [`RecoverySettings::scheduler_config`] converts them into an
//! [`AbandonmentSchedulerConfig`] after validation.

use std::net::SocketAddr;
use std::time::Duration;

use ortho_config::OrthoConfig;
use rust_decimal::Decimal;
use serde::Deserialize;
use url::Url;

use crate::domain::{AbandonmentSchedulerConfig, OfferPolicy};
use crate::outbound::notifier::SmtpSettings;

const DEFAULT_CHECKOUT_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_CONTENT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
const DEFAULT_CONTENT_MODEL: &str = "deepseek/deepseek-chat-v3.1:free";
const DEFAULT_METRICS_BIND_ADDR: &str = "0.0.0.0:9090";
const MAX_PERCENTAGE: u32 = 100;

/// Invalid or missing settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    /// No database URL was supplied.
    #[error("database_url is required")]
    MissingDatabaseUrl,
    /// A duration or count must be positive.
    #[error("{field} must be greater than zero")]
    NotPositive {
        /// Offending setting.
        field: &'static str,
    },
    /// A percentage setting exceeds its upper bound.
    #[error("{field} must not exceed {max}")]
    AboveMaximum {
        /// Offending setting.
        field: &'static str,
        /// Largest accepted value.
        max: u32,
    },
    /// A URL setting does not parse.
    #[error("{field} is not a valid URL: {message}")]
    InvalidUrl {
        /// Offending setting.
        field: &'static str,
        /// Parser detail.
        message: String,
    },
    /// A listen address setting does not parse.
    #[error("{field} is not a valid socket address: {value}")]
    InvalidAddress {
        /// Offending setting.
        field: &'static str,
        /// Rejected value.
        value: String,
    },
}

/// Configuration for the recovery engine process.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "CART_RECOVERY")]
pub struct RecoverySettings {
    /// PostgreSQL connection URL.
    pub database_url: Option<String>,
    /// Maximum pooled database connections.
    #[ortho_config(default = 10)]
    pub pool_max_size: u32,
    /// Minutes of inactivity before an active cart is abandoned.
    #[ortho_config(default = 30)]
    pub abandonment_threshold_minutes: u64,
    /// Hours an unconverted attempt waits before a follow-up.
    #[ortho_config(default = 24)]
    pub follow_up_age_hours: u64,
    /// Seconds between scheduler cycles.
    #[ortho_config(default = 300)]
    pub cycle_interval_seconds: u64,
    /// Seconds to wait after a cycle in which a step failed.
    #[ortho_config(default = 60)]
    pub error_backoff_seconds: u64,
    /// Highest discount percentage any offer may carry.
    #[ortho_config(default = 25)]
    pub max_offer_percentage: u32,
    /// Percentage added to the previous offer on each follow-up.
    #[ortho_config(default = 5)]
    pub follow_up_step_percentage: u32,
    /// Attempts allowed per cart, first contact included.
    #[ortho_config(default = 3)]
    pub max_attempts_per_cart: u32,
    /// Upper bound in seconds on each content generator or notifier call.
    #[ortho_config(default = 20)]
    pub collaborator_timeout_seconds: u64,
    /// Chat completion endpoint for generated content.
    pub content_endpoint: Option<String>,
    /// API key for the content endpoint; generation is disabled without it.
    pub content_api_key: Option<String>,
    /// Model requested from the content endpoint.
    pub content_model: Option<String>,
    /// SMTP relay host.
    pub smtp_host: Option<String>,
    /// SMTP relay port.
    #[ortho_config(default = 587)]
    pub smtp_port: u16,
    /// SMTP login user.
    pub smtp_user: Option<String>,
    /// SMTP login password.
    pub smtp_password: Option<String>,
    /// Sender address; defaults to the SMTP user.
    pub from_email: Option<String>,
    /// Base URL for checkout links in recovery messages.
    pub checkout_base_url: Option<String>,
    /// Listen address for the Prometheus scrape endpoint.
    pub metrics_bind_addr: Option<String>,
}

/// Chat completion settings, present only when an API key is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSettings {
    /// Completion endpoint.
    pub endpoint: Url,
    /// Bearer token.
    pub api_key: String,
    /// Requested model.
    pub model: String,
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|raw| raw.trim()).filter(|trimmed| !trimmed.is_empty())
}

fn positive_secs(field: &'static str, seconds: u64) -> Result<Duration, SettingsError> {
    if seconds == 0 {
        return Err(SettingsError::NotPositive { field });
    }
    Ok(Duration::from_secs(seconds))
}

fn positive_count(field: &'static str, value: u32) -> Result<u32, SettingsError> {
    if value == 0 {
        return Err(SettingsError::NotPositive { field });
    }
    Ok(value)
}

fn percentage(field: &'static str, value: u32) -> Result<Decimal, SettingsError> {
    let value = positive_count(field, value)?;
    if value > MAX_PERCENTAGE {
        return Err(SettingsError::AboveMaximum {
            field,
            max: MAX_PERCENTAGE,
        });
    }
    Ok(Decimal::from(value))
}

fn parse_url(field: &'static str, raw: &str) -> Result<Url, SettingsError> {
    Url::parse(raw).map_err(|err| SettingsError::InvalidUrl {
        field,
        message: err.to_string(),
    })
}

impl RecoverySettings {
    /// Database URL, required to start the engine.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::MissingDatabaseUrl`] when absent or blank.
    pub fn database_url(&self) -> Result<&str, SettingsError> {
        non_blank(self.database_url.as_ref()).ok_or(SettingsError::MissingDatabaseUrl)
    }

    /// Address the `/metrics` exporter binds to.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::InvalidAddress`] when the value is not a
    /// `host:port` socket address.
    pub fn metrics_bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        let raw = non_blank(self.metrics_bind_addr.as_ref()).unwrap_or(DEFAULT_METRICS_BIND_ADDR);
        raw.parse().map_err(|_| SettingsError::InvalidAddress {
            field: "metrics_bind_addr",
            value: raw.to_owned(),
        })
    }

    /// Collaborator call timeout.
    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_secs(self.collaborator_timeout_seconds.max(1))
    }

    /// Convert into the scheduler's domain configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when a pacing value or offer percentage is
    /// zero, a percentage exceeds 100, or the checkout URL does not parse.
    pub fn scheduler_config(&self) -> Result<AbandonmentSchedulerConfig, SettingsError> {
        let threshold_secs = self.abandonment_threshold_minutes.saturating_mul(60);
        let follow_up_secs = self.follow_up_age_hours.saturating_mul(60 * 60);
        let checkout_base_url =
            non_blank(self.checkout_base_url.as_ref()).unwrap_or(DEFAULT_CHECKOUT_BASE_URL);
        parse_url("checkout_base_url", checkout_base_url)?;
        let ceiling = percentage("max_offer_percentage", self.max_offer_percentage)?;
        let step = percentage("follow_up_step_percentage", self.follow_up_step_percentage)?;

        Ok(AbandonmentSchedulerConfig {
            abandonment_threshold: positive_secs("abandonment_threshold_minutes", threshold_secs)?,
            follow_up_age: positive_secs("follow_up_age_hours", follow_up_secs)?,
            cycle_interval: positive_secs("cycle_interval_seconds", self.cycle_interval_seconds)?,
            error_backoff: positive_secs("error_backoff_seconds", self.error_backoff_seconds)?,
            collaborator_timeout: positive_secs(
                "collaborator_timeout_seconds",
                self.collaborator_timeout_seconds,
            )?,
            offer_policy: OfferPolicy::new(ceiling, step),
            max_attempts_per_cart: positive_count(
                "max_attempts_per_cart",
                self.max_attempts_per_cart,
            )?,
            checkout_base_url: checkout_base_url.to_owned(),
        })
    }

    /// Content generator settings, or `None` when no API key is configured.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::InvalidUrl`] for an unparsable endpoint.
    pub fn content_settings(&self) -> Result<Option<ContentSettings>, SettingsError> {
        let Some(api_key) = non_blank(self.content_api_key.as_ref()) else {
            return Ok(None);
        };
        let endpoint = non_blank(self.content_endpoint.as_ref()).unwrap_or(DEFAULT_CONTENT_ENDPOINT);
        Ok(Some(ContentSettings {
            endpoint: parse_url("content_endpoint", endpoint)?,
            api_key: api_key.to_owned(),
            model: non_blank(self.content_model.as_ref())
                .unwrap_or(DEFAULT_CONTENT_MODEL)
                .to_owned(),
        }))
    }

    /// SMTP settings, or `None` unless host, user, and password are all set.
    pub fn smtp_settings(&self) -> Option<SmtpSettings> {
        let host = non_blank(self.smtp_host.as_ref())?;
        let username = non_blank(self.smtp_user.as_ref())?;
        let password = non_blank(self.smtp_password.as_ref())?;
        let from_email = non_blank(self.from_email.as_ref()).unwrap_or(username);
        Some(SmtpSettings {
            host: host.to_owned(),
            port: self.smtp_port,
            username: username.to_owned(),
            password: password.to_owned(),
            from_email: from_email.to_owned(),
            timeout: self.collaborator_timeout(),
        })
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for settings parsing and conversion.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    const VARS: [&str; 10] = [
        "CART_RECOVERY_DATABASE_URL",
        "CART_RECOVERY_ABANDONMENT_THRESHOLD_MINUTES",
        "CART_RECOVERY_MAX_OFFER_PERCENTAGE",
        "CART_RECOVERY_FOLLOW_UP_STEP_PERCENTAGE",
        "CART_RECOVERY_CONTENT_API_KEY",
        "CART_RECOVERY_SMTP_HOST",
        "CART_RECOVERY_SMTP_USER",
        "CART_RECOVERY_SMTP_PASSWORD",
        "CART_RECOVERY_CHECKOUT_BASE_URL",
        "CART_RECOVERY_METRICS_BIND_ADDR",
    ];

    fn cleared() -> Vec<(&'static str, Option<String>)> {
        VARS.iter().map(|name| (*name, None)).collect()
    }

    fn load_from_empty_args() -> RecoverySettings {
        RecoverySettings::load_from_iter([OsString::from("cart-recovery")])
            .expect("config should load")
    }

    #[rstest]
    fn defaults_apply_when_unset() {
        let _guard = lock_env(cleared());

        let settings = load_from_empty_args();
        let config = settings.scheduler_config().expect("defaults are valid");

        assert_eq!(settings.database_url(), Err(SettingsError::MissingDatabaseUrl));
        assert_eq!(config, AbandonmentSchedulerConfig::default());
        assert_eq!(settings.content_settings(), Ok(None));
        assert!(settings.smtp_settings().is_none());
        assert_eq!(settings.pool_max_size, 10);
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let mut vars = cleared();
        vars.extend([
            ("CART_RECOVERY_DATABASE_URL", Some("postgres://db/shop".to_owned())),
            ("CART_RECOVERY_ABANDONMENT_THRESHOLD_MINUTES", Some("45".to_owned())),
            ("CART_RECOVERY_MAX_OFFER_PERCENTAGE", Some("20".to_owned())),
            ("CART_RECOVERY_CHECKOUT_BASE_URL", Some("https://shop.example".to_owned())),
        ]);
        let _guard = lock_env(vars);

        let settings = load_from_empty_args();
        let config = settings.scheduler_config().expect("overrides are valid");

        assert_eq!(settings.database_url(), Ok("postgres://db/shop"));
        assert_eq!(config.abandonment_threshold, Duration::from_secs(45 * 60));
        assert_eq!(config.offer_policy.ceiling(), Decimal::from(20));
        assert_eq!(config.checkout_base_url, "https://shop.example");
    }

    #[rstest]
    fn content_generation_requires_an_api_key() {
        let mut vars = cleared();
        vars.push(("CART_RECOVERY_CONTENT_API_KEY", Some("sk-test".to_owned())));
        let _guard = lock_env(vars);

        let content = load_from_empty_args()
            .content_settings()
            .expect("endpoint valid")
            .expect("key configured");

        assert_eq!(content.endpoint.as_str(), DEFAULT_CONTENT_ENDPOINT);
        assert_eq!(content.model, DEFAULT_CONTENT_MODEL);
    }

    #[rstest]
    fn smtp_requires_credentials_and_defaults_sender() {
        let mut vars = cleared();
        vars.extend([
            ("CART_RECOVERY_SMTP_HOST", Some("smtp.example.com".to_owned())),
            ("CART_RECOVERY_SMTP_USER", Some("shop@example.com".to_owned())),
        ]);
        let partial = lock_env(vars.clone());
        assert!(load_from_empty_args().smtp_settings().is_none());
        drop(partial);

        vars.push(("CART_RECOVERY_SMTP_PASSWORD", Some("secret".to_owned())));
        let _guard = lock_env(vars);
        let smtp = load_from_empty_args()
            .smtp_settings()
            .expect("credentials complete");

        assert_eq!(smtp.port, 587);
        assert_eq!(smtp.from_email, "shop@example.com");
    }

    #[rstest]
    fn invalid_checkout_url_is_rejected() {
        let mut vars = cleared();
        vars.push(("CART_RECOVERY_CHECKOUT_BASE_URL", Some("not a url".to_owned())));
        let _guard = lock_env(vars);

        let error = load_from_empty_args()
            .scheduler_config()
            .expect_err("url invalid");

        assert!(matches!(
            error,
            SettingsError::InvalidUrl {
                field: "checkout_base_url",
                ..
            }
        ));
    }

    #[rstest]
    #[case(
        "CART_RECOVERY_FOLLOW_UP_STEP_PERCENTAGE",
        "0",
        SettingsError::NotPositive { field: "follow_up_step_percentage" }
    )]
    #[case(
        "CART_RECOVERY_MAX_OFFER_PERCENTAGE",
        "0",
        SettingsError::NotPositive { field: "max_offer_percentage" }
    )]
    #[case(
        "CART_RECOVERY_MAX_OFFER_PERCENTAGE",
        "150",
        SettingsError::AboveMaximum { field: "max_offer_percentage", max: 100 }
    )]
    fn offer_percentages_must_allow_escalation(
        #[case] name: &'static str,
        #[case] value: &str,
        #[case] expected: SettingsError,
    ) {
        let mut vars = cleared();
        vars.push((name, Some(value.to_owned())));
        let _guard = lock_env(vars);

        let error = load_from_empty_args()
            .scheduler_config()
            .expect_err("percentage rejected");

        assert_eq!(error, expected);
    }

    #[rstest]
    fn accepted_percentages_escalate_strictly_below_the_ceiling() {
        let _guard = lock_env(cleared());

        let policy = load_from_empty_args()
            .scheduler_config()
            .expect("defaults are valid")
            .offer_policy;
        let previous = crate::domain::Offer::percentage(Decimal::from(10));
        let next = policy.follow_up_offer(&previous, None);

        assert!(next.value > previous.value);
    }

    #[rstest]
    #[case::default(None, Ok("0.0.0.0:9090"))]
    #[case::override_(Some("127.0.0.1:9464"), Ok("127.0.0.1:9464"))]
    #[case::hostname(Some("metrics.internal:9090"), Err("metrics.internal:9090"))]
    fn metrics_bind_addr_parses_socket_addresses(
        #[case] raw: Option<&str>,
        #[case] expected: Result<&str, &str>,
    ) {
        let mut vars = cleared();
        vars.push(("CART_RECOVERY_METRICS_BIND_ADDR", raw.map(str::to_owned)));
        let _guard = lock_env(vars);

        let parsed = load_from_empty_args().metrics_bind_addr();

        let expected = expected
            .map(|addr| addr.parse::<SocketAddr>().expect("fixture address parses"))
            .map_err(|value| SettingsError::InvalidAddress {
                field: "metrics_bind_addr",
                value: value.to_owned(),
            });
        assert_eq!(parsed, expected);
    }
}
