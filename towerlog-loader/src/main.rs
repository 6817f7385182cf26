//! NRG tower log loader binary.
//!
//! Copies new binary logger files into staging, converts them to text with the vendor
//! converter and loads measurements and site metadata into DuckDB. Each run processes the
//! files missing from the ledger and exits.

use std::process::ExitCode;

use towerlog_config::shared::LoaderConfig;
use towerlog_telemetry::metrics::init_metrics;
use towerlog_telemetry::tracing::init_tracing;
use tracing::{error, info};

use crate::config::load_loader_config;
use crate::core::start_loader_with_config;
use crate::error::{LoaderError, LoaderResult};

mod config;
mod converter;
mod core;
mod error;
mod fs;
mod pipeline;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

/// Loads configuration, initializes telemetry and runs one load on a multi-threaded runtime.
fn run() -> LoaderResult<()> {
    match dotenvy::dotenv() {
        Err(err) if !err.not_found() => return Err(LoaderError::config(err)),
        _ => {}
    }

    let loader_config = load_loader_config()?;

    let telemetry = &loader_config.telemetry;
    let _log_flusher = init_tracing(
        env!("CARGO_BIN_NAME"),
        telemetry.log_dir.as_deref(),
        telemetry.json,
    )
    .map_err(LoaderError::config)?;

    init_metrics(env!("CARGO_BIN_NAME"), telemetry.metrics_listen)
        .map_err(LoaderError::config)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(loader_config))
}

async fn async_main(loader_config: LoaderConfig) -> LoaderResult<()> {
    match start_loader_with_config(loader_config).await {
        Ok(summary) => {
            info!(
                pending = summary.pending_files,
                loaded = summary.loaded_files,
                failed = summary.failed_files,
                rows = summary.rows_inserted,
                "loader run completed"
            );
            Ok(())
        }
        Err(err) => {
            error!("{err}");
            Err(err)
        }
    }
}
