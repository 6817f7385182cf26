use std::path::Path;
use std::sync::Once;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info";

static TEST_TRACING: Once = Once::new();

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to create log directory: {0}")]
    LogDirectory(#[from] std::io::Error),
    #[error("failed to install tracing subscriber: {0}")]
    Install(#[from] TryInitError),
}

/// Flushes buffered log lines when dropped.
///
/// Keep it alive until the process exits, otherwise the tail of a file log may be lost.
#[must_use]
pub struct LogFlusher {
    _guard: Option<WorkerGuard>,
}

/// Installs the global tracing subscriber.
///
/// With a `log_dir`, events go to a daily rolling file named after `app_name`; otherwise they
/// go to stdout. `json` selects JSON lines instead of the human readable format. The filter is
/// read from `RUST_LOG` and defaults to `info`.
pub fn init_tracing(
    app_name: &str,
    log_dir: Option<&Path>,
    json: bool,
) -> Result<LogFlusher, TracingError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let (layer, guard): (Box<dyn Layer<Registry> + Send + Sync>, _) = match log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir)?;
            let appender = tracing_appender::rolling::daily(log_dir, format!("{app_name}.log"));
            let (writer, guard) = tracing_appender::non_blocking(appender);

            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            let layer = if json {
                layer.json().boxed()
            } else {
                layer.boxed()
            };
            (layer, Some(guard))
        }
        None => {
            let layer = if json {
                fmt::layer().json().boxed()
            } else {
                fmt::layer().boxed()
            };
            (layer, None)
        }
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init()?;

    Ok(LogFlusher { _guard: guard })
}

/// Installs a subscriber writing to the test harness output, at most once per process.
pub fn init_test_tracing() {
    TEST_TRACING.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_logging_creates_directory_and_flushes() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");

        let flusher = init_tracing("towerlog-loader", Some(&log_dir), true).unwrap();
        tracing::info!(file = "site_42.rld", "test event");
        drop(flusher);

        assert!(log_dir.is_dir());
        assert_eq!(std::fs::read_dir(&log_dir).unwrap().count(), 1);
    }
}
