//! Outbound adapters for metrics exporting.
//!
//! Prometheus-backed implementation of the cycle metrics port and the HTTP
//! exporter that serves it, gated behind the `metrics` feature.

mod exporter;
mod prometheus_recovery_cycles;

pub use exporter::{MetricsExporterError, prometheus_middleware, serve_metrics};
pub use prometheus_recovery_cycles::PrometheusRecoveryCycleMetrics;
