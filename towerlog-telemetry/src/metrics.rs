use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use tracing::info;

/// Installs the Prometheus recorder and its scrape endpoint on `listen`.
///
/// Without an address no recorder is installed and every counter is a no-op.
pub fn init_metrics(app_name: &str, listen: Option<SocketAddr>) -> Result<(), BuildError> {
    let Some(listen) = listen else {
        return Ok(());
    };

    PrometheusBuilder::new()
        .with_http_listener(listen)
        .add_global_label("app", app_name)
        .install()?;
    info!(%listen, "metrics endpoint listening");

    Ok(())
}
