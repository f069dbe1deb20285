//! Metrics recorder initialization.

use std::net::SocketAddr;

use tracing::info;

use crate::error::Result;

/// Configuration for the metrics system.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorderConfig {
    /// Address for the Prometheus scrape endpoint. `None` leaves the no-op
    /// recorder in place, so every `counter!` call is discarded.
    pub listen: Option<SocketAddr>,
}

/// Install the global metrics recorder.
///
/// Must be called from within a Tokio runtime when an exporter is requested,
/// because the scrape listener is spawned on it.
pub fn init_metrics(config: MetricsRecorderConfig) -> Result<()> {
    let Some(addr) = config.listen else {
        info!("metrics collection is disabled");
        return Ok(());
    };

    #[cfg(feature = "prometheus")]
    {
        use {
            crate::buckets,
            metrics_exporter_prometheus::{Matcher, PrometheusBuilder},
        };

        PrometheusBuilder::new()
            .with_http_listener(addr)
            .set_buckets_for_metric(
                Matcher::Suffix("_duration_seconds".to_string()),
                &buckets::COMPLETION_DURATION,
            )?
            .install()?;
        info!(%addr, "prometheus metrics exporter listening");
        Ok(())
    }

    #[cfg(not(feature = "prometheus"))]
    {
        Err(crate::error::Error::unavailable(format!(
            "cannot listen on {addr}: built without the `prometheus` feature"
        )))
    }
}
