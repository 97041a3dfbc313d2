use std::net::SocketAddr;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder with its own HTTP listener serving the
/// exposition format on `addr`. Must run inside a tokio runtime.
pub fn install_exporter(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("prometheus: install exporter")?;

    crate::ingest::ensure_metrics_described();
    tracing::info!(%addr, "prometheus exporter listening");
    Ok(())
}
