use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::info;

use crate::bail;
use crate::destination::{ColumnFilter, Warehouse};
use crate::error::{ErrorKind, LoadResult};
use crate::load_error;
use crate::types::{Cell, ColumnSchema, TableRow};

#[derive(Debug)]
struct MemoryTable {
    columns: Vec<ColumnSchema>,
    rows: Vec<Vec<Cell>>,
}

impl MemoryTable {
    fn column_position(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Default)]
struct Inner {
    // Keyed by the uppercased table name.
    tables: HashMap<String, MemoryTable>,
    tables_created: usize,
    columns_added: usize,
}

impl Inner {
    fn table(&self, table_name: &str) -> LoadResult<&MemoryTable> {
        self.tables
            .get(&table_name.to_uppercase())
            .ok_or_else(|| {
                load_error!(
                    ErrorKind::DestinationTableMissing,
                    "Table does not exist",
                    table_name
                )
            })
    }

    fn table_mut(&mut self, table_name: &str) -> LoadResult<&mut MemoryTable> {
        self.tables
            .get_mut(&table_name.to_uppercase())
            .ok_or_else(|| {
                load_error!(
                    ErrorKind::DestinationTableMissing,
                    "Table does not exist",
                    table_name
                )
            })
    }
}

/// In-memory warehouse for testing and development purposes.
///
/// Tables are matched case-insensitively and primary keys are enforced on append, mirroring a
/// relational store. The number of create and add-column operations is recorded so tests can
/// assert on the DDL a run issued.
#[derive(Debug, Clone, Default)]
pub struct MemoryWarehouse {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the rows stored in `table_name`, in table column order.
    pub fn table_rows(&self, table_name: &str) -> LoadResult<Vec<TableRow>> {
        let inner = self.lock()?;
        let table = inner.table(table_name)?;

        Ok(table.rows.iter().cloned().map(TableRow::new).collect())
    }

    /// Returns the column definitions of `table_name`.
    pub fn table_schema(&self, table_name: &str) -> LoadResult<Vec<ColumnSchema>> {
        Ok(self.lock()?.table(table_name)?.columns.clone())
    }

    /// Returns how many tables were created.
    pub fn tables_created(&self) -> LoadResult<usize> {
        Ok(self.lock()?.tables_created)
    }

    /// Returns how many add-column operations were applied.
    pub fn columns_added(&self) -> LoadResult<usize> {
        Ok(self.lock()?.columns_added)
    }

    fn lock(&self) -> LoadResult<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| {
            load_error!(
                ErrorKind::WorkerPanic,
                "Memory warehouse lock poisoned"
            )
        })
    }
}

impl Warehouse for MemoryWarehouse {
    fn table_exists(&self, table_name: &str) -> LoadResult<bool> {
        Ok(self
            .lock()?
            .tables
            .contains_key(&table_name.to_uppercase()))
    }

    fn table_columns(&self, table_name: &str) -> LoadResult<Vec<String>> {
        let inner = self.lock()?;

        Ok(inner
            .table(table_name)?
            .columns
            .iter()
            .map(|column| column.name.clone())
            .collect())
    }

    fn create_table(&self, table_name: &str, columns: &[ColumnSchema]) -> LoadResult<()> {
        let mut inner = self.lock()?;
        let key = table_name.to_uppercase();
        if inner.tables.contains_key(&key) {
            return Ok(());
        }

        info!(table = table_name, columns = columns.len(), "creating memory table");
        inner.tables.insert(
            key,
            MemoryTable {
                columns: columns.to_vec(),
                rows: Vec::new(),
            },
        );
        inner.tables_created += 1;

        Ok(())
    }

    fn add_column(&self, table_name: &str, column: &ColumnSchema) -> LoadResult<()> {
        let mut inner = self.lock()?;
        let table = inner.table_mut(table_name)?;
        if table.column_position(&column.name).is_some() {
            bail!(
                ErrorKind::DestinationSchemaError,
                "Column already exists",
                format!("{table_name}.{}", column.name)
            );
        }

        table.columns.push(column.clone());
        for row in &mut table.rows {
            row.push(Cell::Null);
        }
        inner.columns_added += 1;

        Ok(())
    }

    fn select_column(
        &self,
        table_name: &str,
        column: &str,
        filter: Option<ColumnFilter<'_>>,
    ) -> LoadResult<Vec<Cell>> {
        let inner = self.lock()?;
        let table = inner.table(table_name)?;

        let position = |name: &str| {
            table.column_position(name).ok_or_else(|| {
                load_error!(
                    ErrorKind::DestinationSchemaError,
                    "Column does not exist",
                    format!("{table_name}.{name}")
                )
            })
        };

        let selected = position(column)?;
        let filter = filter
            .map(|filter| position(filter.column).map(|index| (index, filter.value)))
            .transpose()?;

        Ok(table
            .rows
            .iter()
            .filter(|row| filter.is_none_or(|(index, value)| row[index] == *value))
            .map(|row| row[selected].clone())
            .collect())
    }

    fn append_rows(
        &self,
        table_name: &str,
        columns: &[ColumnSchema],
        rows: Vec<TableRow>,
    ) -> LoadResult<usize> {
        let mut inner = self.lock()?;
        let table = inner.table_mut(table_name)?;

        let mut targets = Vec::with_capacity(columns.len());
        for column in columns {
            let Some(position) = table.column_position(&column.name) else {
                bail!(
                    ErrorKind::DestinationSchemaError,
                    "Column does not exist",
                    format!("{table_name}.{}", column.name)
                );
            };
            targets.push(position);
        }

        let mut stored: Vec<Vec<Cell>> = Vec::with_capacity(rows.len());
        for row in rows {
            let mut values = vec![Cell::Null; table.columns.len()];
            for (target, value) in targets.iter().zip(row.into_values()) {
                values[*target] = value;
            }
            stored.push(values);
        }

        let key_positions: Vec<usize> = table
            .columns
            .iter()
            .enumerate()
            .filter(|(_, column)| column.primary_key)
            .map(|(index, _)| index)
            .collect();

        if !key_positions.is_empty() {
            let key_of = |row: &Vec<Cell>| -> Vec<Cell> {
                key_positions.iter().map(|index| row[*index].clone()).collect()
            };
            let mut keys: HashSet<Vec<Cell>> = table.rows.iter().map(key_of).collect();
            if !stored.iter().all(|row| keys.insert(key_of(row))) {
                bail!(
                    ErrorKind::DestinationQueryFailed,
                    "Primary key constraint violated",
                    table_name
                );
            }
        }

        let count = stored.len();
        table.rows.extend(stored);

        Ok(count)
    }
}
