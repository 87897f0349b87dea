//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod cart_store;
mod content_generator;
mod notifier;
mod recovery_cycle_metrics;
mod recovery_ledger;

#[cfg(test)]
pub use cart_store::MockCartStore;
pub use cart_store::{CartStore, CartStoreError};
#[cfg(test)]
pub use content_generator::MockContentGenerator;
pub use content_generator::{ContentGenerator, ContentGeneratorError, DisabledContentGenerator};
#[cfg(test)]
pub use notifier::MockNotifier;
pub use notifier::{Notifier, NotifierError};
#[cfg(test)]
pub use recovery_cycle_metrics::MockRecoveryCycleMetrics;
pub use recovery_cycle_metrics::{
    NoOpRecoveryCycleMetrics, RecoveryCycleMetrics, RecoveryCycleMetricsError,
};
#[cfg(test)]
pub use recovery_ledger::MockRecoveryLedger;
pub use recovery_ledger::{RecoveryLedger, RecoveryLedgerError};
