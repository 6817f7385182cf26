//! Insert-only, key-deduplicated appends.
//!
//! [`upsert_new`] never updates stored values: rows whose key is already present are skipped
//! and only the remainder is appended. The existence check and the append are separate
//! warehouse calls, so concurrent writers to the same table can both insert the same key.
//! A single writer per table is assumed.

use std::collections::HashSet;

use metrics::counter;
use tracing::{debug, info};

use crate::bail;
use crate::destination::{ColumnFilter, Warehouse};
use crate::error::{ErrorKind, LoadResult};
use crate::metrics::{TABLE_NAME_LABEL, TOWERLOG_ROWS_INSERTED_TOTAL, TOWERLOG_ROWS_SKIPPED_TOTAL};
use crate::types::{Cell, RecordBatch};

/// How existing rows are identified.
#[derive(Debug, Clone, Copy)]
pub enum KeyStrategy<'a> {
    /// Rows are identified by `column` across the whole table.
    Primary { column: &'a str },
    /// Rows are identified by `child_column` among rows whose `parent_column` equals
    /// `parent_value`.
    Scoped {
        parent_column: &'a str,
        parent_value: &'a Cell,
        child_column: &'a str,
    },
}

impl KeyStrategy<'_> {
    fn key_column(&self) -> &str {
        match self {
            KeyStrategy::Primary { column } => *column,
            KeyStrategy::Scoped { child_column, .. } => *child_column,
        }
    }

    fn filter(&self) -> Option<ColumnFilter<'_>> {
        match self {
            KeyStrategy::Primary { .. } => None,
            KeyStrategy::Scoped {
                parent_column,
                parent_value,
                ..
            } => Some(ColumnFilter {
                column: *parent_column,
                value: *parent_value,
            }),
        }
    }
}

/// Outcome of [`upsert_new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// This many new rows were appended.
    Inserted(usize),
    /// Every batch row was already stored.
    NothingNew,
}

impl UpsertOutcome {
    /// Returns the appended row count, or `-1` when nothing was new.
    pub fn as_count(&self) -> i64 {
        match self {
            UpsertOutcome::Inserted(count) => *count as i64,
            UpsertOutcome::NothingNew => -1,
        }
    }
}

/// Appends the rows of `batch` whose key is not yet stored in `table_name`.
///
/// The batch keeps its column order. Fails with [`ErrorKind::MissingKeyColumn`] when the batch
/// has no column for the strategy's key. Warehouse errors are returned without retrying.
pub fn upsert_new<W>(
    warehouse: &W,
    table_name: &str,
    mut batch: RecordBatch,
    strategy: KeyStrategy<'_>,
) -> LoadResult<UpsertOutcome>
where
    W: Warehouse + ?Sized,
{
    let key_column = strategy.key_column();
    let Some(key_index) = batch.find_column(key_column) else {
        bail!(
            ErrorKind::MissingKeyColumn,
            "Batch lacks the key column",
            format!("{table_name}.{key_column}")
        );
    };

    let existing: HashSet<Cell> = warehouse
        .select_column(table_name, key_column, strategy.filter())?
        .into_iter()
        .collect();

    let total = batch.len();
    batch.retain_rows(|row| !existing.contains(&row.values()[key_index]));
    let skipped = total - batch.len();

    counter!(TOWERLOG_ROWS_SKIPPED_TOTAL, TABLE_NAME_LABEL => table_name.to_owned())
        .increment(skipped as u64);

    if batch.is_empty() {
        debug!(table = table_name, skipped, "no new rows to insert");
        return Ok(UpsertOutcome::NothingNew);
    }

    let (columns, rows) = batch.into_parts();
    let inserted = warehouse.append_rows(table_name, &columns, rows)?;
    counter!(TOWERLOG_ROWS_INSERTED_TOTAL, TABLE_NAME_LABEL => table_name.to_owned())
        .increment(inserted as u64);
    info!(table = table_name, inserted, skipped, "appended new rows");

    Ok(UpsertOutcome::Inserted(inserted))
}
