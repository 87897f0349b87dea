//! Port and runtime dependency bundles, shutdown signalling, and the task
//! handle for the abandonment scheduler.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::info;

use crate::domain::ports::{
    CartStore, ContentGenerator, Notifier, RecoveryCycleMetrics, RecoveryLedger,
};

use super::{AbandonmentScheduler, CycleSleeper};

/// Port bundle required by the scheduler.
pub struct AbandonmentSchedulerPorts {
    /// Cart persistence adapter.
    pub cart_store: Arc<dyn CartStore>,
    /// Recovery attempt ledger adapter.
    pub ledger: Arc<dyn RecoveryLedger>,
    /// Outreach content collaborator.
    pub content_generator: Arc<dyn ContentGenerator>,
    /// Message delivery collaborator.
    pub notifier: Arc<dyn Notifier>,
    /// Cycle metrics adapter.
    pub metrics: Arc<dyn RecoveryCycleMetrics>,
}

impl AbandonmentSchedulerPorts {
    /// Build a strongly-typed scheduler port bundle.
    pub fn new(
        cart_store: Arc<dyn CartStore>,
        ledger: Arc<dyn RecoveryLedger>,
        content_generator: Arc<dyn ContentGenerator>,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<dyn RecoveryCycleMetrics>,
    ) -> Self {
        Self {
            cart_store,
            ledger,
            content_generator,
            notifier,
            metrics,
        }
    }
}

/// Runtime helpers used by the cycle loop.
pub struct AbandonmentSchedulerRuntime {
    /// Async sleep implementation.
    pub sleeper: Arc<dyn CycleSleeper>,
}

impl Default for AbandonmentSchedulerRuntime {
    fn default() -> Self {
        Self {
            sleeper: Arc::new(TokioSleeper),
        }
    }
}

/// Tokio-based sleeper implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl CycleSleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Receiving side of the scheduler's shutdown flag.
#[derive(Debug, Clone)]
pub struct ShutdownSignal(watch::Receiver<bool>);

impl ShutdownSignal {
    /// Create a connected sender and signal.
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (sender, receiver) = watch::channel(false);
        (sender, Self(receiver))
    }

    /// A signal that never fires, for one-off cycles.
    pub fn never() -> Self {
        let (sender, signal) = Self::channel();
        // Receivers keep the last value after the sender drops.
        drop(sender);
        signal
    }

    /// Whether shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolve once shutdown is requested. Pends forever when the sender is
    /// dropped without requesting shutdown.
    pub async fn triggered(&mut self) {
        if self.0.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Handle to a scheduler running on a background task.
pub struct SchedulerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Spawn the cycle loop on the current Tokio runtime.
    ///
    /// ```rust,ignore
    /// let handle = SchedulerHandle::spawn(Arc::new(scheduler));
    /// tokio::signal::ctrl_c().await?;
    /// handle.shutdown().await?;
    /// ```
    pub fn spawn(scheduler: Arc<AbandonmentScheduler>) -> Self {
        let (stop, signal) = ShutdownSignal::channel();
        let task = tokio::spawn(async move { scheduler.run(signal).await });
        Self { stop, task }
    }

    /// Request shutdown and wait for the in-flight cart to finish.
    ///
    /// # Errors
    ///
    /// Returns the join error when the scheduler task panicked or was aborted.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        info!("abandonment scheduler shutdown requested");
        self.stop.send_replace(true);
        self.task.await
    }
}
