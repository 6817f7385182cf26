use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Logging and metrics settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TelemetryConfig {
    /// When set, logs go to a daily rolling file in this directory instead of stdout.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Emits logs as JSON lines.
    #[serde(default)]
    pub json: bool,
    /// Address of the Prometheus scrape endpoint. Metrics are not exported when unset.
    #[serde(default)]
    pub metrics_listen: Option<SocketAddr>,
}
