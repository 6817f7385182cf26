use std::collections::HashSet;

use metrics::counter;
use tracing::{debug, info, warn};

use crate::destination::Warehouse;
use crate::error::LoadResult;
use crate::metrics::{TABLE_NAME_LABEL, TOWERLOG_COLUMNS_ADDED_TOTAL, TOWERLOG_TABLES_CREATED_TOTAL};
use crate::types::{ColumnSchema, RecordBatch};

/// Outcome of [`ensure_schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaOutcome {
    /// The batch holds no rows, so nothing was reconciled.
    EmptyBatch,
    /// The table does not exist and the batch lacks the key column, so it was not created.
    MissingKeyColumn,
    /// The table was created from the batch columns.
    Created,
    /// Missing columns were added to the existing table.
    Altered { added: Vec<String> },
    /// The existing table already held every batch column.
    Unchanged,
}

impl SchemaOutcome {
    /// Returns `true` when the table is ready to receive the batch.
    pub fn is_ready(&self) -> bool {
        matches!(
            self,
            SchemaOutcome::Created | SchemaOutcome::Altered { .. } | SchemaOutcome::Unchanged
        )
    }
}

/// Makes the column set of `table_name` a superset of the batch columns.
///
/// A missing table is created from the batch, with `key_column` as primary key when
/// `key_is_primary` is set. For an existing table every batch column absent from it, compared
/// case-insensitively, is added. Existing columns are never altered or dropped.
pub fn ensure_schema<W>(
    warehouse: &W,
    table_name: &str,
    batch: &RecordBatch,
    key_column: &str,
    key_is_primary: bool,
) -> LoadResult<SchemaOutcome>
where
    W: Warehouse + ?Sized,
{
    if batch.is_empty() {
        debug!(table = table_name, "empty batch, skipping schema reconciliation");
        return Ok(SchemaOutcome::EmptyBatch);
    }

    if !warehouse.table_exists(table_name)? {
        let Some(key_index) = batch.column_index(key_column) else {
            warn!(
                table = table_name,
                column = key_column,
                "key column missing from batch, table not created"
            );
            return Ok(SchemaOutcome::MissingKeyColumn);
        };

        let columns: Vec<ColumnSchema> = batch
            .columns()
            .iter()
            .enumerate()
            .map(|(index, column)| {
                let column = ColumnSchema::new(column.name.clone(), column.kind);
                if key_is_primary && index == key_index {
                    column.into_primary_key()
                } else {
                    column
                }
            })
            .collect();

        warehouse.create_table(table_name, &columns)?;
        counter!(TOWERLOG_TABLES_CREATED_TOTAL, TABLE_NAME_LABEL => table_name.to_owned())
            .increment(1);
        info!(
            table = table_name,
            columns = columns.len(),
            primary_key = key_is_primary,
            "created table"
        );

        return Ok(SchemaOutcome::Created);
    }

    let existing: HashSet<String> = warehouse
        .table_columns(table_name)?
        .into_iter()
        .map(|name| name.to_uppercase())
        .collect();

    let mut added = Vec::new();
    for column in batch.columns() {
        if existing.contains(&column.name.to_uppercase()) {
            continue;
        }

        let column = ColumnSchema::new(column.name.clone(), column.kind);
        warehouse.add_column(table_name, &column)?;
        counter!(TOWERLOG_COLUMNS_ADDED_TOTAL, TABLE_NAME_LABEL => table_name.to_owned())
            .increment(1);
        info!(table = table_name, column = %column.name, kind = ?column.kind, "added column");
        added.push(column.name);
    }

    if added.is_empty() {
        Ok(SchemaOutcome::Unchanged)
    } else {
        Ok(SchemaOutcome::Altered { added })
    }
}
