//! Domain port surface for scheduler cycle counters.
//!
//! Adapters export per-cycle outcome counts without the scheduler knowing
//! which exporter is in use.

use async_trait::async_trait;

use super::define_port_error;
use crate::domain::recovery::CycleReport;

define_port_error! {
    /// Errors exposed when recording cycle metrics.
    pub enum RecoveryCycleMetricsError {
        /// Metric exporter rejected the write.
        Export { message } =>
            "recovery cycle metrics exporter failed: {message}",
    }
}

/// Metrics recording port for completed scheduler cycles.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecoveryCycleMetrics: Send + Sync {
    /// Record the outcome counts of one cycle.
    ///
    /// ```rust,ignore
    /// use cart_recovery::domain::CycleReport;
    /// use cart_recovery::domain::ports::{NoOpRecoveryCycleMetrics, RecoveryCycleMetrics};
    ///
    /// # async fn demo() {
    /// let metrics = NoOpRecoveryCycleMetrics;
    /// assert!(metrics.record_cycle(&CycleReport::default()).await.is_ok());
    /// # }
    /// ```
    async fn record_cycle(&self, report: &CycleReport) -> Result<(), RecoveryCycleMetricsError>;
}

/// No-op implementation used when metrics are disabled or in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpRecoveryCycleMetrics;

#[async_trait]
impl RecoveryCycleMetrics for NoOpRecoveryCycleMetrics {
    async fn record_cycle(&self, _report: &CycleReport) -> Result<(), RecoveryCycleMetricsError> {
        Ok(())
    }
}
