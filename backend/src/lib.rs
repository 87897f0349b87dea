//! Abandoned cart monitoring and recovery engine.
//!
//! The domain owns the cart lifecycle, the offer ladder, and the scheduler;
//! outbound adapters bind its ports to PostgreSQL, a chat completion API,
//! SMTP, and Prometheus.

pub mod config;
pub mod domain;
pub mod outbound;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
