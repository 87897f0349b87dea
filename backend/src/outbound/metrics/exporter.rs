//! HTTP exporter serving the Prometheus registry at `/metrics`.
//!
//! The `actix-web-prom` middleware owns the registry; cycle counters register
//! into it so a single scrape returns them alongside the exporter's own HTTP
//! metrics.

use std::net::SocketAddr;

use actix_web::dev::Server;
use actix_web::{App, HttpServer};
use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};

const METRICS_NAMESPACE: &str = "cart_recovery";
const METRICS_PATH: &str = "/metrics";

/// Failure while setting up the metrics exporter.
#[derive(Debug, thiserror::Error)]
pub enum MetricsExporterError {
    /// The Prometheus middleware could not be configured.
    #[error("failed to configure Prometheus metrics: {message}")]
    Configure {
        /// Builder detail.
        message: String,
    },
    /// The listen address could not be bound.
    #[error("failed to bind metrics exporter to {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: SocketAddr,
        /// Socket error.
        source: std::io::Error,
    },
}

/// Build the middleware whose registry backs the `/metrics` endpoint.
///
/// # Errors
///
/// Returns [`MetricsExporterError::Configure`] when the builder rejects its
/// settings.
pub fn prometheus_middleware() -> Result<PrometheusMetrics, MetricsExporterError> {
    PrometheusMetricsBuilder::new(METRICS_NAMESPACE)
        .endpoint(METRICS_PATH)
        .build()
        .map_err(|err| MetricsExporterError::Configure {
            message: err.to_string(),
        })
}

/// Bind a single-worker server that answers scrapes on `addr`.
///
/// Signal handling stays with the caller, which stops the server through
/// [`Server::handle`].
///
/// # Errors
///
/// Returns [`MetricsExporterError::Bind`] when the address is unavailable.
pub fn serve_metrics(
    middleware: PrometheusMetrics,
    addr: SocketAddr,
) -> Result<Server, MetricsExporterError> {
    let server = HttpServer::new(move || App::new().wrap(middleware.clone()))
        .workers(1)
        .disable_signals()
        .bind(addr)
        .map_err(|source| MetricsExporterError::Bind { addr, source })?
        .run();
    Ok(server)
}

#[cfg(test)]
mod tests {
    //! Scrape coverage for the exporter middleware.

    use super::*;
    use actix_web::test;

    use crate::domain::CycleReport;
    use crate::domain::ports::RecoveryCycleMetrics;
    use crate::outbound::metrics::PrometheusRecoveryCycleMetrics;

    #[actix_web::test]
    async fn scrape_includes_recovery_cycle_counters() {
        let middleware = prometheus_middleware().expect("middleware builds");
        let metrics =
            PrometheusRecoveryCycleMetrics::new(&middleware.registry).expect("counters register");
        metrics
            .record_cycle(&CycleReport {
                abandoned: 2,
                ..CycleReport::default()
            })
            .await
            .expect("cycle recorded");
        let app = test::init_service(App::new().wrap(middleware)).await;

        let body = test::call_and_read_body(
            &app,
            test::TestRequest::get().uri(METRICS_PATH).to_request(),
        )
        .await;
        let text = String::from_utf8_lossy(&body);

        assert!(text.contains("recovery_cycles_total{outcome=\"completed\"} 1"));
        assert!(text.contains("recovery_cycle_events_total{event=\"abandoned\"} 2"));
    }
}
