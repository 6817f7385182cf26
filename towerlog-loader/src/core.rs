use towerlog_config::shared::{
    ConverterConfig, LedgerConfig, LoaderConfig, PathsConfig, WarehouseConfig,
};
use towerlog_destinations::duckdb::{DuckDbLedger, DuckDbWarehouse};
use tracing::{debug, info};

use crate::converter::CommandConverter;
use crate::error::LoaderResult;
use crate::pipeline::{Pipeline, RunSummary};

/// Runs the loader once with the provided configuration.
///
/// Opens the DuckDB warehouse and ledger, then processes every binary file in the raw
/// directory that the ledger does not list yet.
pub async fn start_loader_with_config(config: LoaderConfig) -> LoaderResult<RunSummary> {
    info!("starting loader run");

    log_config(&config);

    let warehouse = DuckDbWarehouse::new(
        &config.warehouse.path,
        config.warehouse.pool_size,
        config.warehouse.schema.clone(),
    )?;
    let ledger = DuckDbLedger::open(&config.ledger.path)?;
    let converter = CommandConverter::from_config(&config.converter);

    let pipeline = Pipeline::new(config, warehouse, ledger, converter);

    pipeline.run().await
}

fn log_config(config: &LoaderConfig) {
    log_paths_config(&config.paths);
    log_converter_config(&config.converter);
    log_warehouse_config(&config.warehouse);
    log_ledger_config(&config.ledger);
}

fn log_paths_config(config: &PathsConfig) {
    debug!(
        raw_dir = %config.raw_dir.display(),
        rld_dir = %config.rld_dir.display(),
        txt_dir = %config.txt_dir.display(),
        "using paths config"
    );
}

fn log_converter_config(config: &ConverterConfig) {
    debug!(
        program = %config.program,
        args = ?config.args,
        max_attempts = config.max_attempts,
        retry_delay_ms = config.retry_delay_ms,
        timeout_secs = config.timeout_secs,
        "using converter config"
    );
}

fn log_warehouse_config(config: &WarehouseConfig) {
    debug!(
        path = %config.path.display(),
        pool_size = config.pool_size,
        schema = %config.schema,
        data_table_prefix = %config.data_table_prefix,
        loggers_table = %config.loggers_table,
        sensors_table = %config.sensors_table,
        "using duckdb warehouse config"
    );
}

fn log_ledger_config(config: &LedgerConfig) {
    debug!(
        path = %config.path.display(),
        uploaded_by = %config.uploaded_by,
        "using ledger config"
    );
}
