use std::collections::HashSet;
use std::fs;
use std::path::Path;

use duckdb::DuckdbConnectionManager;
use duckdb::types::{TimeUnit, Value};
use r2d2::{Pool, PooledConnection};
use towerlog::error::{ErrorKind, LoadResult};
use towerlog::load_error;
use towerlog::store::{LedgerEntry, UploadLedger};
use tracing::info;

/// Table recording processed binary files.
pub const LEDGER_TABLE: &str = "decrypted_n_uploaded";

/// An [`UploadLedger`] stored in a local DuckDB file.
///
/// The ledger table is created on open and only ever appended to.
#[derive(Clone)]
pub struct DuckDbLedger {
    pool: Pool<DuckdbConnectionManager>,
}

impl DuckDbLedger {
    /// Opens the ledger at `path`, creating the file, its directory and the table as needed.
    pub fn open(path: &Path) -> LoadResult<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            if !parent.exists() {
                info!(directory = %parent.display(), "creating ledger directory");
            }
            fs::create_dir_all(parent)?;
        }

        let manager = DuckdbConnectionManager::file(path).map_err(|e| {
            load_error!(
                ErrorKind::LedgerError,
                "Failed to open DuckDB ledger",
                path.display(),
                source: e
            )
        })?;
        let pool = Pool::builder().max_size(1).build(manager).map_err(|e| {
            load_error!(
                ErrorKind::LedgerError,
                "Failed to build DuckDB ledger pool",
                source: e
            )
        })?;

        let ledger = Self { pool };
        ledger
            .connection()?
            .execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {LEDGER_TABLE} \
                 (file_name VARCHAR, upload_timestamp TIMESTAMP, uploaded_by VARCHAR)"
            ))
            .map_err(|e| {
                load_error!(
                    ErrorKind::LedgerError,
                    "Failed to create ledger table",
                    source: e
                )
            })?;

        Ok(ledger)
    }

    fn connection(&self) -> LoadResult<PooledConnection<DuckdbConnectionManager>> {
        self.pool.get().map_err(|e| {
            load_error!(
                ErrorKind::LedgerError,
                "Failed to get DuckDB ledger connection",
                source: e
            )
        })
    }
}

impl UploadLedger for DuckDbLedger {
    fn processed_files(&self) -> LoadResult<HashSet<String>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(&format!("SELECT file_name FROM {LEDGER_TABLE}"))
            .map_err(|e| {
                load_error!(ErrorKind::LedgerError, "Failed to read ledger", source: e)
            })?;

        stmt.query_map([], |row| row.get::<_, String>(0))
            .and_then(|rows| rows.collect::<Result<HashSet<_>, _>>())
            .map_err(|e| load_error!(ErrorKind::LedgerError, "Failed to read ledger", source: e))
    }

    fn record_processed(&self, entries: &[LedgerEntry]) -> LoadResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection()?;
        let tx = conn.transaction().map_err(|e| {
            load_error!(
                ErrorKind::LedgerError,
                "Failed to begin ledger transaction",
                source: e
            )
        })?;

        {
            let mut appender = tx.appender(LEDGER_TABLE).map_err(|e| {
                load_error!(
                    ErrorKind::LedgerError,
                    "Failed to create ledger appender",
                    source: e
                )
            })?;

            for entry in entries {
                let values = [
                    Value::Text(entry.file_name.clone()),
                    Value::Timestamp(
                        TimeUnit::Microsecond,
                        entry.upload_timestamp.and_utc().timestamp_micros(),
                    ),
                    Value::Text(entry.uploaded_by.clone()),
                ];

                appender
                    .append_row(duckdb::appender_params_from_iter(&values))
                    .map_err(|e| {
                        load_error!(
                            ErrorKind::LedgerError,
                            "Failed to append ledger entry",
                            entry.file_name.clone(),
                            source: e
                        )
                    })?;
            }

            appender.flush().map_err(|e| {
                load_error!(
                    ErrorKind::LedgerError,
                    "Failed to flush ledger entries",
                    source: e
                )
            })?;
        }

        tx.commit().map_err(|e| {
            load_error!(
                ErrorKind::LedgerError,
                "Failed to commit ledger entries",
                source: e
            )
        })?;

        info!(count = entries.len(), "recorded processed files");

        Ok(())
    }
}
