use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use towerlog::destination::Warehouse;
use towerlog::error::{ErrorKind, LoadError, LoadResult};
use towerlog::load_error;
use towerlog::metadata::{
    MetadataRegistration, RLD_FILE_COLUMN, TIMESTAMP_COLUMN, TXT_FILE_COLUMN, data_table_name,
    register_site_metadata, site_number,
};
use towerlog::metrics::{OUTCOME_LABEL, TOWERLOG_FILES_FAILED_TOTAL, TOWERLOG_FILES_LOADED_TOTAL};
use towerlog::schema::ensure_schema;
use towerlog::store::{LedgerEntry, UploadLedger};
use towerlog::text::{TableExtraction, TextDocument, extract_table};
use towerlog::types::Cell;
use towerlog::upsert::{KeyStrategy, UpsertOutcome, upsert_new};
use towerlog_config::shared::{LoaderConfig, WarehouseConfig};
use tracing::{debug, error, info, warn};

use crate::converter::{LogConverter, convert_with_retries};
use crate::error::LoaderResult;
use crate::fs;

const RLD_EXTENSION: &str = "rld";
const TXT_EXTENSION: &str = "txt";
/// Suffix the converter gives to measurement exports.
const MEASUREMENT_SUFFIX: &str = "_meas.txt";

/// Counts of what a single run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Binary files not yet in the ledger.
    pub pending_files: usize,
    /// Text exports found after conversion.
    pub text_files: usize,
    /// Exports whose measurements reached the warehouse, including those with nothing new.
    pub loaded_files: usize,
    /// Exports without measurement rows.
    pub empty_files: usize,
    /// Exports without a site number.
    pub skipped_files: usize,
    /// Exports whose load failed.
    pub failed_files: usize,
    pub rows_inserted: usize,
    /// Binary files recorded in the ledger.
    pub ledgered_files: usize,
}

/// How the load of one text export ended.
#[derive(Debug)]
enum FileOutcome {
    NoSiteNumber,
    NoData { table: String },
    Loaded { table: String, outcome: UpsertOutcome },
}

/// One run over the raw directory.
///
/// The pipeline copies the binary files missing from the ledger into staging, converts them,
/// loads each export into the warehouse and finally ledgers the files that completed. Exports
/// are processed one at a time, and warehouse and ledger calls run on the blocking pool.
pub struct Pipeline<W, L, C> {
    config: LoaderConfig,
    warehouse: W,
    ledger: L,
    converter: C,
}

impl<W, L, C> Pipeline<W, L, C>
where
    W: Warehouse + Clone + Send + Sync + 'static,
    L: UploadLedger + Clone + Send + Sync + 'static,
    C: LogConverter,
{
    pub fn new(config: LoaderConfig, warehouse: W, ledger: L, converter: C) -> Self {
        Self {
            config,
            warehouse,
            ledger,
            converter,
        }
    }

    pub async fn run(&self) -> LoaderResult<RunSummary> {
        let paths = &self.config.paths;
        let mut summary = RunSummary::default();

        let raw_files = fs::list_files(&paths.raw_dir, RLD_EXTENSION).await?;
        let ledger = self.ledger.clone();
        let processed = run_blocking(move || ledger.processed_files()).await?;

        let pending: Vec<String> = raw_files
            .into_iter()
            .filter(|name| !processed.contains(name))
            .collect();
        summary.pending_files = pending.len();

        if pending.is_empty() {
            info!(directory = %paths.raw_dir.display(), "no pending binary files");
            return Ok(summary);
        }
        info!(count = pending.len(), "found pending binary files");

        fs::clear_dir(&paths.rld_dir).await?;
        fs::copy_files(&paths.raw_dir, &paths.rld_dir, &pending).await?;
        fs::clear_dir(&paths.txt_dir).await?;

        let converter_config = &self.config.converter;
        if let Err(err) = convert_with_retries(
            &self.converter,
            &paths.rld_dir,
            &paths.txt_dir,
            converter_config.max_attempts,
            Duration::from_millis(converter_config.retry_delay_ms),
        )
        .await
        {
            error!(error = %err, "conversion failed, loading the text files present");
        }

        let text_files = fs::list_files(&paths.txt_dir, TXT_EXTENSION).await?;
        summary.text_files = text_files.len();

        let mut entries = Vec::new();
        for txt_name in text_files {
            let rld_name = rld_file_name(&txt_name);

            match self.load_file(&txt_name, &rld_name).await {
                Ok(FileOutcome::NoSiteNumber) => {
                    warn!(file = %txt_name, "site number missing, export not loaded");
                    summary.skipped_files += 1;
                    continue;
                }
                Ok(FileOutcome::NoData { table }) => {
                    warn!(file = %txt_name, table = %table, "no measurement data found");
                    summary.empty_files += 1;
                    counter!(TOWERLOG_FILES_LOADED_TOTAL, OUTCOME_LABEL => "empty").increment(1);
                }
                Ok(FileOutcome::Loaded { table, outcome }) => {
                    if let UpsertOutcome::Inserted(count) = outcome {
                        info!(file = %txt_name, table = %table, count, "inserted rows");
                        summary.rows_inserted += count;
                    }
                    summary.loaded_files += 1;
                    counter!(TOWERLOG_FILES_LOADED_TOTAL, OUTCOME_LABEL => "loaded").increment(1);
                }
                Err(err) => {
                    error!(
                        file = %txt_name,
                        kind = ?err.kind(),
                        error = %err,
                        "failed to load export"
                    );
                    summary.failed_files += 1;
                    counter!(TOWERLOG_FILES_FAILED_TOTAL).increment(1);
                    continue;
                }
            }

            entries.push(LedgerEntry {
                file_name: rld_name,
                upload_timestamp: Utc::now().naive_utc(),
                uploaded_by: self.config.ledger.uploaded_by.clone(),
            });
        }

        summary.ledgered_files = entries.len();
        if !entries.is_empty() {
            let ledger = self.ledger.clone();
            run_blocking(move || ledger.record_processed(&entries)).await?;
        }

        info!(?summary, "run finished");

        Ok(summary)
    }

    /// Loads one text export and registers its site metadata.
    async fn load_file(&self, txt_name: &str, rld_name: &str) -> LoadResult<FileOutcome> {
        let path = self.config.paths.txt_dir.join(txt_name);
        let bytes = tokio::fs::read(&path).await?;
        let doc = TextDocument::from_bytes(&bytes);

        let warehouse = self.warehouse.clone();
        let tables = self.config.warehouse.clone();
        let txt_name = txt_name.to_owned();
        let rld_name = rld_name.to_owned();

        run_blocking(move || load_document(&warehouse, &tables, &doc, &txt_name, &rld_name)).await
    }
}

/// Loads the measurements of `doc`, then its logger and sensor metadata.
///
/// A metadata failure is logged and does not change the outcome.
fn load_document<W>(
    warehouse: &W,
    tables: &WarehouseConfig,
    doc: &TextDocument,
    txt_name: &str,
    rld_name: &str,
) -> LoadResult<FileOutcome>
where
    W: Warehouse,
{
    let Some(site) = site_number(doc) else {
        return Ok(FileOutcome::NoSiteNumber);
    };
    let table = data_table_name(&tables.data_table_prefix, &site);
    debug!(file = txt_name, table = %table, "loading export");

    let measurements = load_measurements(warehouse, &table, doc, txt_name, rld_name);

    match register_site_metadata(warehouse, doc, &tables.loggers_table, &tables.sensors_table) {
        Ok(MetadataRegistration::Registered { channels, .. }) => {
            debug!(file = txt_name, site = %site, channels, "site metadata registered");
        }
        Ok(other) => {
            warn!(file = txt_name, site = %site, registration = ?other, "site metadata not registered");
        }
        Err(err) => {
            error!(file = txt_name, site = %site, error = %err, "failed to register site metadata");
        }
    }

    match measurements? {
        Some(outcome) => Ok(FileOutcome::Loaded { table, outcome }),
        None => Ok(FileOutcome::NoData { table }),
    }
}

/// Returns [`None`] when the export holds no loadable measurement rows.
fn load_measurements<W>(
    warehouse: &W,
    table: &str,
    doc: &TextDocument,
    txt_name: &str,
    rld_name: &str,
) -> LoadResult<Option<UpsertOutcome>>
where
    W: Warehouse,
{
    let extracted = match extract_table(doc, TIMESTAMP_COLUMN, TIMESTAMP_COLUMN) {
        TableExtraction::Table(extracted) => extracted,
        TableExtraction::MarkerNotFound | TableExtraction::MissingKeyColumn => return Ok(None),
    };

    if !extracted.rejected_rows.is_empty() {
        warn!(
            file = txt_name,
            count = extracted.rejected_rows.len(),
            "dropped measurement rows"
        );
    }

    let mut batch = extracted.batch;
    if batch.is_empty() {
        return Ok(None);
    }
    batch.set_constant_column(RLD_FILE_COLUMN, Cell::from(rld_name));
    batch.set_constant_column(TXT_FILE_COLUMN, Cell::from(txt_name));

    if !ensure_schema(warehouse, table, &batch, TIMESTAMP_COLUMN, true)?.is_ready() {
        return Ok(None);
    }

    upsert_new(
        warehouse,
        table,
        batch,
        KeyStrategy::Primary {
            column: TIMESTAMP_COLUMN,
        },
    )
    .map(Some)
}

/// Derives the binary file name from the name of its measurement export.
fn rld_file_name(txt_name: &str) -> String {
    match txt_name.strip_suffix(MEASUREMENT_SUFFIX) {
        Some(stem) => format!("{stem}.{RLD_EXTENSION}"),
        None => txt_name.to_owned(),
    }
}

/// Runs blocking warehouse or ledger work off the async runtime.
async fn run_blocking<T, F>(work: F) -> LoadResult<T>
where
    F: FnOnce() -> LoadResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| -> LoadError {
            load_error!(ErrorKind::WorkerPanic, "Blocking task panicked", source: err)
        })?
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use towerlog::destination::memory::MemoryWarehouse;
    use towerlog::store::ledger::memory::MemoryLedger;
    use towerlog::test_utils::{export_with_measurements, sample_export};
    use towerlog_config::shared::{
        ConverterConfig, LedgerConfig, PathsConfig, TelemetryConfig, WarehouseConfig,
    };

    use super::*;
    use crate::converter::test_utils::FakeConverter;

    fn config(root: &Path) -> LoaderConfig {
        LoaderConfig {
            paths: PathsConfig {
                raw_dir: root.join("raw"),
                rld_dir: root.join("RLD_INPUT"),
                txt_dir: root.join("TXT_OUTPUT"),
            },
            converter: ConverterConfig {
                program: "fake".to_owned(),
                args: vec![],
                max_attempts: 2,
                retry_delay_ms: 0,
                timeout_secs: 1,
            },
            warehouse: WarehouseConfig::default(),
            ledger: LedgerConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }

    async fn drop_raw_files(root: &Path, stems: &[&str]) {
        tokio::fs::create_dir_all(root.join("raw")).await.unwrap();
        for stem in stems {
            tokio::fs::write(root.join("raw").join(format!("{stem}.rld")), b"binary")
                .await
                .unwrap();
        }
    }

    /// Renders exports whose file stem starts with the site number.
    fn render_by_site(stem: &str) -> String {
        match stem.split('_').next() {
            Some("empty") => export_with_measurements("9", &[]),
            Some("nosite") => "Export Parameters\nExport Date: 2024-01-02\n\n".to_owned(),
            Some(site) => sample_export(site),
            None => String::new(),
        }
    }

    #[test]
    fn rld_name_is_derived_from_export_name() {
        assert_eq!(rld_file_name("000042_2024_meas.txt"), "000042_2024.rld");
        assert_eq!(rld_file_name("notes.txt"), "notes.txt");
    }

    #[tokio::test]
    async fn loads_pending_files_once() {
        let root = tempfile::tempdir().unwrap();
        drop_raw_files(root.path(), &["42_a", "7_b"]).await;

        let warehouse = MemoryWarehouse::new();
        let ledger = MemoryLedger::new();
        let converter = FakeConverter::new(1, render_by_site);
        let pipeline = Pipeline::new(
            config(root.path()),
            warehouse.clone(),
            ledger.clone(),
            converter.clone(),
        );

        let summary = pipeline.run().await.unwrap();
        assert_eq!(
            summary,
            RunSummary {
                pending_files: 2,
                text_files: 2,
                loaded_files: 2,
                rows_inserted: 4,
                ledgered_files: 2,
                ..RunSummary::default()
            }
        );
        assert_eq!(converter.calls(), 2);

        let ledgered: Vec<_> = ledger
            .entries()
            .unwrap()
            .into_iter()
            .map(|entry| entry.file_name)
            .collect();
        assert_eq!(ledgered, vec!["42_a.rld", "7_b.rld"]);

        let schema = warehouse.table_schema("NRG_Tower_SN_42").unwrap();
        let names: Vec<_> = schema.iter().map(|column| column.name.as_str()).collect();
        assert!(names.contains(&RLD_FILE_COLUMN));
        assert!(names.contains(&TXT_FILE_COLUMN));
        assert_eq!(warehouse.table_rows("NRG_Loggers").unwrap().len(), 2);

        let second = pipeline.run().await.unwrap();
        assert_eq!(second.pending_files, 0);
        assert_eq!(converter.calls(), 2);
    }

    #[tokio::test]
    async fn exports_without_site_are_not_ledgered() {
        let root = tempfile::tempdir().unwrap();
        drop_raw_files(root.path(), &["nosite_a", "empty_b", "42_c"]).await;

        let ledger = MemoryLedger::new();
        let pipeline = Pipeline::new(
            config(root.path()),
            MemoryWarehouse::new(),
            ledger.clone(),
            FakeConverter::new(0, render_by_site),
        );

        let summary = pipeline.run().await.unwrap();
        assert_eq!(summary.skipped_files, 1);
        assert_eq!(summary.empty_files, 1);
        assert_eq!(summary.loaded_files, 1);

        let ledgered: Vec<_> = ledger
            .entries()
            .unwrap()
            .into_iter()
            .map(|entry| entry.file_name)
            .collect();
        assert_eq!(ledgered, vec!["42_c.rld", "empty_b.rld"]);
        assert!(
            ledger
                .entries()
                .unwrap()
                .iter()
                .all(|entry| entry.uploaded_by == LedgerConfig::DEFAULT_UPLOADED_BY)
        );
    }

    #[tokio::test]
    async fn failed_conversion_still_loads_present_exports() {
        let root = tempfile::tempdir().unwrap();
        drop_raw_files(root.path(), &["42_a"]).await;

        let converter = FakeConverter::new(10, render_by_site);
        let ledger = MemoryLedger::new();
        let pipeline = Pipeline::new(
            config(root.path()),
            MemoryWarehouse::new(),
            ledger.clone(),
            converter.clone(),
        );

        let summary = pipeline.run().await.unwrap();
        assert_eq!(converter.calls(), 2);
        assert_eq!(summary.pending_files, 1);
        assert_eq!(summary.text_files, 0);
        assert!(ledger.entries().unwrap().is_empty());
        assert!(tokio::fs::try_exists(root.path().join("RLD_INPUT").join("42_a.rld")).await.unwrap());
    }
}
