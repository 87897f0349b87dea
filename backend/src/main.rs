//! Recovery engine entry-point: loads settings, migrates the schema, wires
//! the adapters, and runs the abandonment scheduler until interrupted.
//! With the `metrics` feature the cycle counters are served at `/metrics`.

use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::{Context, Result, eyre};
use mockable::DefaultClock;
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use cart_recovery::config::RecoverySettings;
use cart_recovery::domain::ports::{
    ContentGenerator, DisabledContentGenerator, Notifier, RecoveryCycleMetrics,
};
use cart_recovery::domain::{AbandonmentScheduler, AbandonmentSchedulerPorts, SchedulerHandle};
use cart_recovery::outbound::content::HttpContentGenerator;
use cart_recovery::outbound::notifier::{LoggingNotifier, SmtpNotifier};
use cart_recovery::outbound::persistence::{
    DbPool, DieselCartStore, DieselRecoveryLedger, PoolConfig, run_pending_migrations,
};

const POOL_CHECKOUT_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings =
        RecoverySettings::load().map_err(|err| eyre!("failed to load settings: {err}"))?;
    let database_url = settings.database_url()?.to_owned();
    let scheduler_config = settings.scheduler_config()?;

    let pool = DbPool::new(
        PoolConfig::new(database_url.clone())
            .with_max_size(settings.pool_max_size)
            .with_connection_timeout(POOL_CHECKOUT_TIMEOUT),
    )
    .await?;
    pool.probe().await.wrap_err("database is unreachable")?;

    let applied = tokio::task::spawn_blocking(move || run_pending_migrations(&database_url))
        .await
        .wrap_err("migration task failed")??;
    info!(applied, "database schema is current");

    let (cycle_metrics, exporter) = start_metrics(&settings)?;
    let ports = AbandonmentSchedulerPorts::new(
        Arc::new(DieselCartStore::new(pool.clone())),
        Arc::new(DieselRecoveryLedger::new(pool)),
        content_generator(&settings)?,
        notifier(&settings)?,
        cycle_metrics,
    );
    let scheduler = AbandonmentScheduler::new(ports, Arc::new(DefaultClock), scheduler_config);
    let handle = SchedulerHandle::spawn(Arc::new(scheduler));

    tokio::signal::ctrl_c()
        .await
        .wrap_err("failed to listen for shutdown signal")?;
    handle.shutdown().await.wrap_err("scheduler task failed")?;
    exporter.stop().await;
    info!("recovery engine stopped");
    Ok(())
}

fn content_generator(settings: &RecoverySettings) -> Result<Arc<dyn ContentGenerator>> {
    let Some(content) = settings.content_settings()? else {
        warn!("content API key not configured; using template content and tiered offers");
        return Ok(Arc::new(DisabledContentGenerator));
    };
    let generator = HttpContentGenerator::new(
        content.endpoint,
        content.api_key,
        content.model,
        settings.collaborator_timeout(),
    )
    .wrap_err("failed to build content generator client")?;
    Ok(Arc::new(generator))
}

fn notifier(settings: &RecoverySettings) -> Result<Arc<dyn Notifier>> {
    let Some(smtp) = settings.smtp_settings() else {
        warn!("SMTP credentials not configured; recovery messages will only be logged");
        return Ok(Arc::new(LoggingNotifier));
    };
    let notifier = SmtpNotifier::new(smtp).wrap_err("failed to configure SMTP transport")?;
    Ok(Arc::new(notifier))
}

/// Running `/metrics` server, stopped after the scheduler drains.
#[cfg(feature = "metrics")]
struct MetricsExporter(actix_web::dev::ServerHandle);

#[cfg(feature = "metrics")]
impl MetricsExporter {
    async fn stop(self) {
        self.0.stop(true).await;
    }
}

#[cfg(feature = "metrics")]
fn start_metrics(
    settings: &RecoverySettings,
) -> Result<(Arc<dyn RecoveryCycleMetrics>, MetricsExporter)> {
    use cart_recovery::outbound::metrics::{
        PrometheusRecoveryCycleMetrics, prometheus_middleware, serve_metrics,
    };

    let addr = settings.metrics_bind_addr()?;
    let middleware = prometheus_middleware()?;
    let metrics = PrometheusRecoveryCycleMetrics::new(&middleware.registry)
        .wrap_err("failed to register recovery cycle metrics")?;
    let server = serve_metrics(middleware, addr)?;
    let exporter = MetricsExporter(server.handle());
    tokio::spawn(async move {
        if let Err(error) = server.await {
            warn!(error = %error, "metrics exporter stopped unexpectedly");
        }
    });
    info!(%addr, "serving Prometheus metrics at /metrics");
    Ok((Arc::new(metrics), exporter))
}

#[cfg(not(feature = "metrics"))]
struct MetricsExporter;

#[cfg(not(feature = "metrics"))]
impl MetricsExporter {
    #[expect(clippy::unused_async, reason = "matches the metrics-enabled signature")]
    async fn stop(self) {}
}

#[cfg(not(feature = "metrics"))]
fn start_metrics(
    _settings: &RecoverySettings,
) -> Result<(Arc<dyn RecoveryCycleMetrics>, MetricsExporter)> {
    use cart_recovery::domain::ports::NoOpRecoveryCycleMetrics;

    Ok((Arc::new(NoOpRecoveryCycleMetrics), MetricsExporter))
}

#[cfg(test)]
mod tests {
    //! Adapter selection from loaded settings.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    #[rstest]
    fn unconfigured_collaborators_fall_back_to_local_adapters() {
        let _guard = lock_env([
            ("CART_RECOVERY_CONTENT_API_KEY", None::<String>),
            ("CART_RECOVERY_SMTP_HOST", None),
            ("CART_RECOVERY_SMTP_USER", None),
            ("CART_RECOVERY_SMTP_PASSWORD", None),
        ]);
        let settings = RecoverySettings::load_from_iter([OsString::from("cart-recovery")])
            .expect("settings load from the environment");

        assert!(content_generator(&settings).is_ok());
        assert!(notifier(&settings).is_ok());
    }

    #[rstest]
    fn malformed_content_endpoint_is_reported() {
        let _guard = lock_env([
            ("CART_RECOVERY_CONTENT_API_KEY", Some("sk-test".to_owned())),
            ("CART_RECOVERY_CONTENT_ENDPOINT", Some("not a url".to_owned())),
        ]);
        let settings = RecoverySettings::load_from_iter([OsString::from("cart-recovery")])
            .expect("settings load from the environment");

        let error = content_generator(&settings)
            .err()
            .expect("endpoint rejected");

        assert!(error.to_string().contains("content_endpoint"));
    }
}
