//! Prometheus adapter for scheduler cycle counters.
//!
//! One counter family per concern: `recovery_cycles_total` by outcome, and
//! `recovery_cycle_events_total` by event so dashboards can chart abandonment,
//! outreach and failure rates from a single series.

use async_trait::async_trait;
use prometheus::{CounterVec, Opts, Registry};

use crate::domain::CycleReport;
use crate::domain::ports::{RecoveryCycleMetrics, RecoveryCycleMetricsError};

/// Prometheus-backed recorder for cycle reports.
pub struct PrometheusRecoveryCycleMetrics {
    cycles_total: CounterVec,
    events_total: CounterVec,
}

impl PrometheusRecoveryCycleMetrics {
    /// Create and register counters with the provided registry.
    ///
    /// # Errors
    ///
    /// Returns an error when Prometheus rejects metric registration.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let cycles_total = CounterVec::new(
            Opts::new("recovery_cycles_total", "Scheduler cycles by outcome"),
            &["outcome"],
        )?;
        let events_total = CounterVec::new(
            Opts::new(
                "recovery_cycle_events_total",
                "Cart and outreach events observed by scheduler cycles",
            ),
            &["event"],
        )?;
        registry.register(Box::new(cycles_total.clone()))?;
        registry.register(Box::new(events_total.clone()))?;
        Ok(Self {
            cycles_total,
            events_total,
        })
    }

    fn add(&self, event: &str, count: u32) {
        if count > 0 {
            self.events_total
                .with_label_values(&[event])
                .inc_by(f64::from(count));
        }
    }
}

fn cycle_outcome(report: &CycleReport) -> &'static str {
    if report.cancelled {
        "cancelled"
    } else if report.had_step_failure() {
        "failed"
    } else {
        "completed"
    }
}

#[async_trait]
impl RecoveryCycleMetrics for PrometheusRecoveryCycleMetrics {
    async fn record_cycle(&self, report: &CycleReport) -> Result<(), RecoveryCycleMetricsError> {
        self.cycles_total
            .with_label_values(&[cycle_outcome(report)])
            .inc();
        self.add("abandoned", report.abandoned);
        self.add("first_contact", report.first_contacts);
        self.add("follow_up", report.follow_ups);
        self.add("fallback", report.fallbacks);
        self.add("delivery_failure", report.delivery_failures);
        self.add("step_failure", report.step_failures);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for cycle counters.

    use super::*;
    use rstest::rstest;

    fn make_metrics() -> (Registry, PrometheusRecoveryCycleMetrics) {
        let registry = Registry::new();
        let metrics = PrometheusRecoveryCycleMetrics::new(&registry)
            .expect("metric registration should succeed");
        (registry, metrics)
    }

    #[test]
    fn registers_counters_with_registry() {
        let (registry, metrics) = make_metrics();
        metrics.cycles_total.with_label_values(&["completed"]).inc();
        metrics.add("abandoned", 1);
        let families = registry.gather();

        for name in ["recovery_cycles_total", "recovery_cycle_events_total"] {
            assert!(
                families.iter().any(|metric| metric.name() == name),
                "{name} should be registered"
            );
        }
    }

    #[rstest]
    #[case::completed(CycleReport::default(), "completed")]
    #[case::failed(CycleReport { step_failures: 1, ..CycleReport::default() }, "failed")]
    #[case::cancelled(CycleReport { cancelled: true, ..CycleReport::default() }, "cancelled")]
    #[tokio::test]
    async fn labels_cycle_outcome(#[case] report: CycleReport, #[case] outcome: &str) {
        let (_registry, metrics) = make_metrics();

        metrics
            .record_cycle(&report)
            .await
            .expect("recording should not fail");

        let counter = metrics.cycles_total.with_label_values(&[outcome]);
        assert_eq!(counter.get() as u64, 1, "{outcome} should increment");
    }

    #[tokio::test]
    async fn adds_event_counts() {
        let (_registry, metrics) = make_metrics();
        let report = CycleReport {
            abandoned: 3,
            first_contacts: 2,
            follow_ups: 1,
            ..CycleReport::default()
        };

        metrics
            .record_cycle(&report)
            .await
            .expect("recording should not fail");
        metrics
            .record_cycle(&report)
            .await
            .expect("recording should not fail");

        let abandoned = metrics.events_total.with_label_values(&["abandoned"]);
        let follow_ups = metrics.events_total.with_label_values(&["follow_up"]);
        assert_eq!(abandoned.get() as u64, 6);
        assert_eq!(follow_ups.get() as u64, 2);
    }
}
