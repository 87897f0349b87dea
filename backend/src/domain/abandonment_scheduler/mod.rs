//! Periodic abandonment detection and recovery outreach.
//!
//! Each cycle runs three independent steps: the abandonment sweep, first
//! contact for abandoned carts without attempts, and the follow-up sweep for
//! attempts that did not convert. A storage failure aborts the current step
//! only; collaborator failures fall back to template content and tiered
//! offers, so a cycle never stalls on them.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::domain::fallback_content::{fallback_content, follow_up_content};
use crate::domain::ports::{
    CartStore, CartStoreError, ContentGenerator, Notifier, RecoveryCycleMetrics, RecoveryLedger,
    RecoveryLedgerError,
};
use crate::domain::{
    AbandonOutcome, AttemptKind, CartContext, CartSnapshot, CartStatus, CycleReport,
    FollowUpCandidate, NewRecoveryAttempt, Offer, OfferPolicy, OutboundMessage, RecoveryAttempt,
    RecoveryContent,
};

mod runtime;

pub use runtime::{
    AbandonmentSchedulerPorts, AbandonmentSchedulerRuntime, SchedulerHandle, ShutdownSignal,
    TokioSleeper,
};

/// Scheduler configuration: thresholds, pacing, and the offer policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbandonmentSchedulerConfig {
    /// Inactivity after which an active cart counts as abandoned.
    pub abandonment_threshold: Duration,
    /// Age an unconverted attempt must reach before a follow-up.
    pub follow_up_age: Duration,
    /// Pause between cycles.
    pub cycle_interval: Duration,
    /// Pause after a cycle in which a step failed.
    pub error_backoff: Duration,
    /// Upper bound on each collaborator call.
    pub collaborator_timeout: Duration,
    /// Offer tiers, ceiling, and escalation step.
    pub offer_policy: OfferPolicy,
    /// Attempts allowed per cart, first contact included.
    pub max_attempts_per_cart: u32,
    /// Base URL for checkout links in outbound messages.
    pub checkout_base_url: String,
}

impl Default for AbandonmentSchedulerConfig {
    fn default() -> Self {
        Self {
            abandonment_threshold: Duration::from_secs(30 * 60),
            follow_up_age: Duration::from_secs(24 * 60 * 60),
            cycle_interval: Duration::from_secs(300),
            error_backoff: Duration::from_secs(60),
            collaborator_timeout: Duration::from_secs(20),
            offer_policy: OfferPolicy::new(Decimal::from(25), Decimal::from(5)),
            max_attempts_per_cart: 3,
            checkout_base_url: "http://localhost:3000".to_owned(),
        }
    }
}

/// Storage failure that aborted a cycle step.
#[derive(Debug, thiserror::Error)]
pub enum CycleStepError {
    /// Cart store call failed.
    #[error(transparent)]
    CartStore(#[from] CartStoreError),
    /// Ledger call failed.
    #[error(transparent)]
    Ledger(#[from] RecoveryLedgerError),
}

/// Async clock-independent sleeping abstraction for the cycle loop.
#[async_trait]
pub trait CycleSleeper: Send + Sync {
    /// Suspend execution for `duration`.
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepFlow {
    Finished,
    Cancelled,
}

struct PreparedAttempt {
    content: RecoveryContent,
    offer: Offer,
    used_fallback: bool,
}

/// Domain-owned abandonment scheduler.
pub struct AbandonmentScheduler {
    cart_store: Arc<dyn CartStore>,
    ledger: Arc<dyn RecoveryLedger>,
    content_generator: Arc<dyn ContentGenerator>,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<dyn RecoveryCycleMetrics>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn CycleSleeper>,
    config: AbandonmentSchedulerConfig,
}

impl AbandonmentScheduler {
    /// Build a scheduler using default runtime dependencies.
    /// ```rust,ignore
    /// let scheduler = AbandonmentScheduler::new(ports, Arc::new(DefaultClock), config);
    /// ```
    pub fn new(
        ports: AbandonmentSchedulerPorts,
        clock: Arc<dyn Clock>,
        config: AbandonmentSchedulerConfig,
    ) -> Self {
        Self::with_runtime(ports, clock, AbandonmentSchedulerRuntime::default(), config)
    }

    /// Build a scheduler with injected runtime abstractions.
    pub fn with_runtime(
        ports: AbandonmentSchedulerPorts,
        clock: Arc<dyn Clock>,
        runtime: AbandonmentSchedulerRuntime,
        config: AbandonmentSchedulerConfig,
    ) -> Self {
        Self {
            cart_store: ports.cart_store,
            ledger: ports.ledger,
            content_generator: ports.content_generator,
            notifier: ports.notifier,
            metrics: ports.metrics,
            clock,
            sleeper: runtime.sleeper,
            config,
        }
    }

    /// Scheduler configuration.
    pub fn config(&self) -> &AbandonmentSchedulerConfig {
        &self.config
    }

    /// Run cycles until `shutdown` fires.
    ///
    /// The first cycle starts immediately. Shutdown is observed between carts,
    /// between steps, and while sleeping; the in-flight cart always finishes.
    pub async fn run(&self, mut shutdown: ShutdownSignal) {
        info!(
            interval_secs = self.config.cycle_interval.as_secs(),
            "abandonment scheduler started"
        );
        while !shutdown.is_triggered() {
            let report = self.run_cycle(&shutdown).await;
            if report.cancelled {
                break;
            }
            let pause = if report.had_step_failure() {
                self.config.error_backoff
            } else {
                self.config.cycle_interval
            };
            tokio::select! {
                () = self.sleeper.sleep(pause) => {}
                () = shutdown.triggered() => break,
            }
        }
        info!("abandonment scheduler stopped");
    }

    /// Run one full cycle and report what it did.
    ///
    /// Steps run in order; a storage failure aborts only the failing step.
    ///
    /// ```rust,ignore
    /// let report = scheduler.run_cycle(&ShutdownSignal::never()).await;
    /// assert!(!report.cancelled);
    /// ```
    pub async fn run_cycle(&self, shutdown: &ShutdownSignal) -> CycleReport {
        let mut report = CycleReport::default();

        for step in CycleStep::ALL {
            if shutdown.is_triggered() {
                report.cancelled = true;
                break;
            }
            let outcome = match step {
                CycleStep::AbandonmentSweep => self.abandonment_sweep(shutdown, &mut report).await,
                CycleStep::FirstContact => self.first_contact(shutdown, &mut report).await,
                CycleStep::FollowUpSweep => self.follow_up_sweep(shutdown, &mut report).await,
            };
            match outcome {
                Ok(StepFlow::Finished) => {}
                Ok(StepFlow::Cancelled) => {
                    report.cancelled = true;
                    break;
                }
                Err(error) => {
                    report.step_failures += 1;
                    warn!(step = %step, error = %error, "recovery cycle step aborted");
                }
            }
        }

        info!(
            abandoned = report.abandoned,
            first_contacts = report.first_contacts,
            follow_ups = report.follow_ups,
            fallbacks = report.fallbacks,
            delivery_failures = report.delivery_failures,
            step_failures = report.step_failures,
            cancelled = report.cancelled,
            "recovery cycle finished"
        );
        if let Err(error) = self.metrics.record_cycle(&report).await {
            debug!(error = %error, "recovery cycle metrics not recorded");
        }
        report
    }

    async fn abandonment_sweep(
        &self,
        shutdown: &ShutdownSignal,
        report: &mut CycleReport,
    ) -> Result<StepFlow, CycleStepError> {
        let cutoff = cutoff_before(self.clock.utc(), self.config.abandonment_threshold);
        let stale = self.cart_store.find_stale_active(cutoff).await?;

        for snapshot in stale {
            if shutdown.is_triggered() {
                return Ok(StepFlow::Cancelled);
            }
            let cart_id = snapshot.cart.id;
            let outcome = match self
                .cart_store
                .transition_to_abandoned(cart_id, self.clock.utc())
                .await
            {
                Ok(outcome) => outcome,
                Err(CartStoreError::NotFound { .. }) => {
                    debug!(cart_id = %cart_id, "cart vanished before abandonment");
                    continue;
                }
                Err(error) => return Err(error.into()),
            };
            match outcome {
                AbandonOutcome::Abandoned { abandoned_at } => {
                    report.abandoned += 1;
                    info!(
                        cart_id = %cart_id,
                        abandoned_at = %abandoned_at,
                        total_value = %snapshot.cart.total_value,
                        "cart abandoned"
                    );
                }
                AbandonOutcome::AlreadyAbandoned { .. } => {
                    debug!(cart_id = %cart_id, "cart already abandoned");
                }
                AbandonOutcome::Ineligible { status } => {
                    debug!(cart_id = %cart_id, status = %status, "cart left active before abandonment");
                }
            }
        }
        Ok(StepFlow::Finished)
    }

    async fn first_contact(
        &self,
        shutdown: &ShutdownSignal,
        report: &mut CycleReport,
    ) -> Result<StepFlow, CycleStepError> {
        let carts = self.ledger.abandoned_without_attempts().await?;

        for snapshot in carts {
            if shutdown.is_triggered() {
                return Ok(StepFlow::Cancelled);
            }
            let cart_id = snapshot.cart.id;
            let earlier = self
                .ledger
                .attempts_since(cart_id, DateTime::<Utc>::UNIX_EPOCH)
                .await?;
            if !earlier.is_empty() {
                debug!(cart_id = %cart_id, "cart already contacted");
                continue;
            }

            let context = CartContext::from(&snapshot);
            let prepared = self.prepare_first_contact(&context).await;
            let attempt = self
                .record(&snapshot, AttemptKind::Initial, prepared, report)
                .await?;
            self.deliver(&snapshot, &attempt, report).await;
        }
        Ok(StepFlow::Finished)
    }

    async fn follow_up_sweep(
        &self,
        shutdown: &ShutdownSignal,
        report: &mut CycleReport,
    ) -> Result<StepFlow, CycleStepError> {
        let cutoff = cutoff_before(self.clock.utc(), self.config.follow_up_age);
        let candidates = self.ledger.unconverted_attempts_older_than(cutoff).await?;

        for candidate in candidates {
            if shutdown.is_triggered() {
                return Ok(StepFlow::Cancelled);
            }
            if !self.follow_up_allowed(&candidate).await? {
                continue;
            }

            let context = CartContext::from(&candidate.cart);
            let prepared = self
                .prepare_follow_up(&context, &candidate.attempt.offer)
                .await;
            let attempt = self
                .record(&candidate.cart, AttemptKind::FollowUp, prepared, report)
                .await?;
            self.deliver(&candidate.cart, &attempt, report).await;
        }
        Ok(StepFlow::Finished)
    }

    async fn follow_up_allowed(
        &self,
        candidate: &FollowUpCandidate,
    ) -> Result<bool, CycleStepError> {
        let cart_id = candidate.cart.cart.id;
        if candidate.cart.cart.status != CartStatus::Abandoned {
            debug!(cart_id = %cart_id, status = %candidate.cart.cart.status, "cart no longer abandoned");
            return Ok(false);
        }
        if candidate.attempt_count >= self.config.max_attempts_per_cart {
            debug!(
                cart_id = %cart_id,
                attempts = candidate.attempt_count,
                "recovery attempt limit reached"
            );
            return Ok(false);
        }
        // A concurrent cycle may have followed up since the candidate query.
        let since = self
            .ledger
            .attempts_since(cart_id, candidate.attempt.sent_at)
            .await?;
        if since
            .iter()
            .any(|attempt| attempt.id != candidate.attempt.id)
        {
            debug!(cart_id = %cart_id, "later recovery attempt already recorded");
            return Ok(false);
        }
        Ok(true)
    }

    async fn prepare_first_contact(&self, context: &CartContext) -> PreparedAttempt {
        let policy = &self.config.offer_policy;
        let content = self.generated_content(context).await;
        let offer = self
            .bounded(
                "suggest_offer",
                context,
                self.content_generator.suggest_offer(context, &[]),
            )
            .await;
        let used_fallback = content.is_none() || offer.is_none();

        PreparedAttempt {
            content: content.unwrap_or_else(|| fallback_content(context)),
            offer: offer.map_or_else(
                || policy.tier_offer(context.total_value),
                |offer| policy.clamp(offer),
            ),
            used_fallback,
        }
    }

    async fn prepare_follow_up(&self, context: &CartContext, previous: &Offer) -> PreparedAttempt {
        let content = self.generated_content(context).await;
        let suggestion = self
            .bounded(
                "suggest_offer",
                context,
                self.content_generator
                    .suggest_offer(context, std::slice::from_ref(previous)),
            )
            .await;
        let used_fallback = content.is_none() || suggestion.is_none();

        PreparedAttempt {
            content: follow_up_content(content.unwrap_or_else(|| fallback_content(context))),
            offer: self
                .config
                .offer_policy
                .follow_up_offer(previous, suggestion),
            used_fallback,
        }
    }

    async fn generated_content(&self, context: &CartContext) -> Option<RecoveryContent> {
        let content = self
            .bounded(
                "generate",
                context,
                self.content_generator.generate(context),
            )
            .await?;
        if content.subject.trim().is_empty() || content.body.trim().is_empty() {
            warn!(cart_id = %context.cart_id, "content generator returned blank content; using fallback");
            return None;
        }
        Some(content)
    }

    async fn bounded<T, E, F>(&self, call: &'static str, context: &CartContext, future: F) -> Option<T>
    where
        F: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        match tokio::time::timeout(self.config.collaborator_timeout, future).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(error)) => {
                warn!(
                    cart_id = %context.cart_id,
                    call,
                    error = %error,
                    "content generator failed; using fallback"
                );
                None
            }
            Err(_) => {
                warn!(
                    cart_id = %context.cart_id,
                    call,
                    timeout_secs = self.config.collaborator_timeout.as_secs(),
                    "content generator timed out; using fallback"
                );
                None
            }
        }
    }

    async fn record(
        &self,
        snapshot: &CartSnapshot,
        kind: AttemptKind,
        prepared: PreparedAttempt,
        report: &mut CycleReport,
    ) -> Result<RecoveryAttempt, CycleStepError> {
        let attempt = self
            .ledger
            .record_attempt(&NewRecoveryAttempt {
                cart_id: snapshot.cart.id,
                kind,
                sent_at: self.clock.utc(),
                content: prepared.content,
                offer: prepared.offer,
            })
            .await?;

        match kind {
            AttemptKind::Initial => report.first_contacts += 1,
            AttemptKind::FollowUp => report.follow_ups += 1,
        }
        if prepared.used_fallback {
            report.fallbacks += 1;
        }
        info!(
            cart_id = %attempt.cart_id,
            attempt_id = %attempt.id,
            kind = %kind,
            offer_kind = %attempt.offer.kind,
            offer_value = %attempt.offer.value,
            fallback = prepared.used_fallback,
            "recovery attempt recorded"
        );
        Ok(attempt)
    }

    async fn deliver(
        &self,
        snapshot: &CartSnapshot,
        attempt: &RecoveryAttempt,
        report: &mut CycleReport,
    ) {
        let Some(message) =
            OutboundMessage::compose(snapshot, attempt, &self.config.checkout_base_url)
        else {
            info!(
                cart_id = %attempt.cart_id,
                attempt_id = %attempt.id,
                "no contact address; delivery skipped"
            );
            report.delivery_failures += 1;
            return;
        };

        match tokio::time::timeout(self.config.collaborator_timeout, self.notifier.send(&message))
            .await
        {
            Ok(Ok(())) => {
                if let Err(error) = self.ledger.mark_delivered(attempt.id).await {
                    warn!(
                        attempt_id = %attempt.id,
                        error = %error,
                        "delivered attempt not flagged"
                    );
                }
            }
            Ok(Err(error)) => {
                report.delivery_failures += 1;
                warn!(
                    cart_id = %attempt.cart_id,
                    attempt_id = %attempt.id,
                    error = %error,
                    "recovery message not delivered"
                );
            }
            Err(_) => {
                report.delivery_failures += 1;
                warn!(
                    cart_id = %attempt.cart_id,
                    attempt_id = %attempt.id,
                    "notifier timed out"
                );
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleStep {
    AbandonmentSweep,
    FirstContact,
    FollowUpSweep,
}

impl CycleStep {
    const ALL: [Self; 3] = [Self::AbandonmentSweep, Self::FirstContact, Self::FollowUpSweep];
}

impl fmt::Display for CycleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AbandonmentSweep => "abandonment_sweep",
            Self::FirstContact => "first_contact",
            Self::FollowUpSweep => "follow_up_sweep",
        })
    }
}

fn cutoff_before(now: DateTime<Utc>, age: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(age)
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
