//! Scripted content generator, recording notifier, and recording metrics.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::ports::{
    ContentGenerator, ContentGeneratorError, Notifier, NotifierError, RecoveryCycleMetrics,
    RecoveryCycleMetricsError,
};
use crate::domain::{CartContext, CycleReport, Offer, OutboundMessage, RecoveryContent};

fn lock<'a, T>(mutex: &'a Mutex<T>, name: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(_) => panic!("{name} mutex"),
    }
}

/// Content generator answering with fixed results.
pub struct ScriptedContentGenerator {
    content: Result<RecoveryContent, ContentGeneratorError>,
    offer: Result<Offer, ContentGeneratorError>,
    delay: Option<Duration>,
    generate_calls: AtomicUsize,
    offer_histories: Mutex<Vec<Vec<Offer>>>,
}

impl ScriptedContentGenerator {
    /// Answer every call with `content` and `offer`.
    pub fn answering(content: RecoveryContent, offer: Offer) -> Self {
        Self {
            content: Ok(content),
            offer: Ok(offer),
            delay: None,
            generate_calls: AtomicUsize::new(0),
            offer_histories: Mutex::new(Vec::new()),
        }
    }

    /// Fail every call with `error`.
    pub fn failing(error: ContentGeneratorError) -> Self {
        Self {
            content: Err(error.clone()),
            offer: Err(error),
            delay: None,
            generate_calls: AtomicUsize::new(0),
            offer_histories: Mutex::new(Vec::new()),
        }
    }

    /// Wait `delay` before answering.
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..self
        }
    }

    /// Number of `generate` calls seen.
    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    /// Offer histories passed to `suggest_offer`, one entry per call.
    pub fn offer_histories(&self) -> Vec<Vec<Offer>> {
        lock(&self.offer_histories, "offer history").clone()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ContentGenerator for ScriptedContentGenerator {
    async fn generate(
        &self,
        _context: &CartContext,
    ) -> Result<RecoveryContent, ContentGeneratorError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.content.clone()
    }

    async fn suggest_offer(
        &self,
        _context: &CartContext,
        previous: &[Offer],
    ) -> Result<Offer, ContentGeneratorError> {
        lock(&self.offer_histories, "offer history").push(previous.to_vec());
        self.pause().await;
        self.offer.clone()
    }
}

/// Notifier that records every message it is asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    failure: Option<NotifierError>,
    sent: Mutex<Vec<OutboundMessage>>,
}

impl RecordingNotifier {
    /// Record messages and reject each with `error`.
    pub fn failing(error: NotifierError) -> Self {
        Self {
            failure: Some(error),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Messages handed to the notifier, accepted or not.
    pub fn sent(&self) -> Vec<OutboundMessage> {
        lock(&self.sent, "notifier").clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &OutboundMessage) -> Result<(), NotifierError> {
        lock(&self.sent, "notifier").push(message.clone());
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

/// Metrics adapter that keeps every reported cycle.
#[derive(Default)]
pub struct RecordingMetrics(Mutex<Vec<CycleReport>>);

impl RecordingMetrics {
    /// Reports recorded so far.
    pub fn reports(&self) -> Vec<CycleReport> {
        lock(&self.0, "metrics").clone()
    }
}

#[async_trait]
impl RecoveryCycleMetrics for RecordingMetrics {
    async fn record_cycle(&self, report: &CycleReport) -> Result<(), RecoveryCycleMetricsError> {
        lock(&self.0, "metrics").push(*report);
        Ok(())
    }
}
