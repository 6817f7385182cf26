use std::fs;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use duckdb::types::{TimeUnit, Value};
use duckdb::{Connection, DuckdbConnectionManager, params};
use pg_escape::quote_identifier;
use r2d2::{Pool, PooledConnection};
use towerlog::destination::{ColumnFilter, Warehouse};
use towerlog::error::{ErrorKind, LoadResult};
use towerlog::types::{Cell, ColumnSchema, TableRow};
use towerlog::{bail, load_error};
use tracing::{debug, info};

use crate::duckdb::schema::{
    build_add_column_sql, build_create_table_sql, build_select_column_sql,
};

/// A DuckDB warehouse implementing the [`Warehouse`] trait.
///
/// Every operation checks a connection out of an [`r2d2`] pool and returns it when the call
/// ends, whether it succeeded or not. Table and column names are resolved case-insensitively
/// through `information_schema`.
#[derive(Clone)]
pub struct DuckDbWarehouse {
    pool: Pool<DuckdbConnectionManager>,
    schema: String,
}

impl DuckDbWarehouse {
    /// Opens a warehouse backed by the database file at `path`.
    ///
    /// The file and its parent directory are created when missing, and so is `schema`.
    pub fn new(path: &Path, pool_size: u32, schema: impl Into<String>) -> LoadResult<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let manager = DuckdbConnectionManager::file(path).map_err(|e| {
            load_error!(
                ErrorKind::DestinationConnectionFailed,
                "Failed to create DuckDB connection manager",
                path.display(),
                source: e
            )
        })?;

        Self::with_manager(manager, pool_size, schema.into())
    }

    /// Opens a warehouse backed by an in-memory database shared by every pooled connection.
    pub fn new_in_memory(pool_size: u32, schema: impl Into<String>) -> LoadResult<Self> {
        let manager = DuckdbConnectionManager::memory().map_err(|e| {
            load_error!(
                ErrorKind::DestinationConnectionFailed,
                "Failed to create in-memory DuckDB connection manager",
                source: e
            )
        })?;

        Self::with_manager(manager, pool_size, schema.into())
    }

    fn with_manager(
        manager: DuckdbConnectionManager,
        pool_size: u32,
        schema: String,
    ) -> LoadResult<Self> {
        let pool = Pool::builder().max_size(pool_size).build(manager).map_err(|e| {
            load_error!(
                ErrorKind::DestinationConnectionFailed,
                "Failed to build DuckDB connection pool",
                source: e
            )
        })?;

        let warehouse = Self { pool, schema };
        warehouse
            .connection()?
            .execute_batch(&format!(
                "CREATE SCHEMA IF NOT EXISTS {}",
                quote_identifier(&warehouse.schema)
            ))
            .map_err(|e| {
                load_error!(
                    ErrorKind::DestinationQueryFailed,
                    "DuckDB CREATE SCHEMA failed",
                    warehouse.schema.clone(),
                    source: e
                )
            })?;

        Ok(warehouse)
    }

    /// Returns the schema holding the warehouse tables.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    fn connection(&self) -> LoadResult<PooledConnection<DuckdbConnectionManager>> {
        self.pool.get().map_err(|e| {
            load_error!(
                ErrorKind::DestinationConnectionFailed,
                "Failed to get DuckDB connection from pool",
                source: e
            )
        })
    }

    /// Returns the catalog spelling of `table_name`, if the table exists.
    fn catalog_table_name(&self, conn: &Connection, table_name: &str) -> LoadResult<Option<String>> {
        let mut stmt = conn
            .prepare(
                "SELECT table_name FROM information_schema.tables \
                 WHERE lower(table_schema) = lower(?) AND lower(table_name) = lower(?) \
                 LIMIT 1",
            )
            .map_err(|e| {
                load_error!(
                    ErrorKind::DestinationQueryFailed,
                    "DuckDB catalog lookup failed",
                    table_name,
                    source: e
                )
            })?;

        let mut names = stmt
            .query_map(params![self.schema, table_name], |row| row.get::<_, String>(0))
            .map_err(|e| {
                load_error!(
                    ErrorKind::DestinationQueryFailed,
                    "DuckDB catalog lookup failed",
                    table_name,
                    source: e
                )
            })?;

        names.next().transpose().map_err(|e| {
            load_error!(
                ErrorKind::DestinationQueryFailed,
                "DuckDB catalog lookup failed",
                table_name,
                source: e
            )
        })
    }

    /// Returns the column names of an existing table in ordinal order.
    fn catalog_columns(&self, conn: &Connection, table_name: &str) -> LoadResult<Vec<String>> {
        let mut stmt = conn
            .prepare(
                "SELECT column_name FROM information_schema.columns \
                 WHERE lower(table_schema) = lower(?) AND lower(table_name) = lower(?) \
                 ORDER BY ordinal_position",
            )
            .map_err(|e| {
                load_error!(
                    ErrorKind::DestinationQueryFailed,
                    "DuckDB column lookup failed",
                    table_name,
                    source: e
                )
            })?;

        let columns = stmt
            .query_map(params![self.schema, table_name], |row| row.get::<_, String>(0))
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|e| {
                load_error!(
                    ErrorKind::DestinationQueryFailed,
                    "DuckDB column lookup failed",
                    table_name,
                    source: e
                )
            })?;

        if columns.is_empty() {
            bail!(
                ErrorKind::DestinationTableMissing,
                "Table does not exist",
                format!("{}.{table_name}", self.schema)
            );
        }

        Ok(columns)
    }
}

impl Warehouse for DuckDbWarehouse {
    fn table_exists(&self, table_name: &str) -> LoadResult<bool> {
        let conn = self.connection()?;

        Ok(self.catalog_table_name(&conn, table_name)?.is_some())
    }

    fn table_columns(&self, table_name: &str) -> LoadResult<Vec<String>> {
        let conn = self.connection()?;

        self.catalog_columns(&conn, table_name)
    }

    fn create_table(&self, table_name: &str, columns: &[ColumnSchema]) -> LoadResult<()> {
        let ddl = build_create_table_sql(&self.schema, table_name, columns);

        info!(table = table_name, columns = columns.len(), "creating duckdb table");
        self.connection()?.execute_batch(&ddl).map_err(|e| {
            load_error!(
                ErrorKind::DestinationQueryFailed,
                "DuckDB CREATE TABLE failed",
                table_name,
                source: e
            )
        })
    }

    fn add_column(&self, table_name: &str, column: &ColumnSchema) -> LoadResult<()> {
        let ddl = build_add_column_sql(&self.schema, table_name, column);

        info!(table = table_name, column = %column.name, "adding duckdb column");
        self.connection()?.execute_batch(&ddl).map_err(|e| {
            load_error!(
                ErrorKind::DestinationSchemaError,
                "DuckDB ALTER TABLE failed",
                format!("{table_name}.{}", column.name),
                source: e
            )
        })
    }

    fn select_column(
        &self,
        table_name: &str,
        column: &str,
        filter: Option<ColumnFilter<'_>>,
    ) -> LoadResult<Vec<Cell>> {
        let sql = build_select_column_sql(
            &self.schema,
            table_name,
            column,
            filter.map(|filter| filter.column),
        );
        let filter_value = filter.map(|filter| cell_to_value(filter.value.clone()));

        let conn = self.connection()?;
        let mut stmt = conn.prepare(&sql).map_err(|e| {
            load_error!(
                ErrorKind::DestinationQueryFailed,
                "DuckDB SELECT failed",
                format!("{table_name}.{column}"),
                source: e
            )
        })?;

        let values = stmt
            .query_map(duckdb::params_from_iter(filter_value.iter()), |row| {
                row.get::<_, Value>(0)
            })
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|e| {
                load_error!(
                    ErrorKind::DestinationQueryFailed,
                    "DuckDB SELECT failed",
                    format!("{table_name}.{column}"),
                    source: e
                )
            })?;

        values.into_iter().map(value_to_cell).collect()
    }

    fn append_rows(
        &self,
        table_name: &str,
        columns: &[ColumnSchema],
        rows: Vec<TableRow>,
    ) -> LoadResult<usize> {
        let mut conn = self.connection()?;

        let Some(catalog_name) = self.catalog_table_name(&conn, table_name)? else {
            bail!(
                ErrorKind::DestinationTableMissing,
                "Table does not exist",
                format!("{}.{table_name}", self.schema)
            );
        };
        let table_columns = self.catalog_columns(&conn, &catalog_name)?;

        let mut targets = Vec::with_capacity(columns.len());
        for column in columns {
            let Some(position) = table_columns
                .iter()
                .position(|name| name.eq_ignore_ascii_case(&column.name))
            else {
                bail!(
                    ErrorKind::DestinationSchemaError,
                    "Column does not exist",
                    format!("{table_name}.{}", column.name)
                );
            };
            targets.push(position);
        }

        let count = rows.len();
        let tx = conn.transaction().map_err(|e| {
            load_error!(
                ErrorKind::DestinationQueryFailed,
                "Failed to begin DuckDB transaction",
                source: e
            )
        })?;

        {
            let mut appender = tx.appender_to_db(&catalog_name, &self.schema).map_err(|e| {
                load_error!(
                    ErrorKind::DestinationQueryFailed,
                    "Failed to create DuckDB appender",
                    table_name,
                    source: e
                )
            })?;

            for row in rows {
                let mut values = vec![Value::Null; table_columns.len()];
                for (target, cell) in targets.iter().zip(row.into_values()) {
                    values[*target] = cell_to_value(cell);
                }

                appender
                    .append_row(duckdb::appender_params_from_iter(&values))
                    .map_err(|e| {
                        load_error!(
                            ErrorKind::DestinationQueryFailed,
                            "DuckDB append_row failed",
                            table_name,
                            source: e
                        )
                    })?;
            }

            appender.flush().map_err(|e| {
                load_error!(
                    ErrorKind::DestinationQueryFailed,
                    "DuckDB appender flush failed",
                    table_name,
                    source: e
                )
            })?;
        }

        tx.commit().map_err(|e| {
            load_error!(
                ErrorKind::DestinationQueryFailed,
                "DuckDB commit failed",
                table_name,
                source: e
            )
        })?;

        debug!(table = table_name, count, "appended rows to duckdb");

        Ok(count)
    }
}

/// Converts a [`Cell`] to a [`duckdb::types::Value`] for parameters and the appender.
pub(crate) fn cell_to_value(cell: Cell) -> Value {
    match cell {
        Cell::Null => Value::Null,
        Cell::Integer(i) => Value::BigInt(i),
        Cell::Float(f) => Value::Double(f),
        Cell::Text(s) => Value::Text(s),
        Cell::Timestamp(dt) => {
            Value::Timestamp(TimeUnit::Microsecond, dt.and_utc().timestamp_micros())
        }
    }
}

/// Converts a value read back from DuckDB into a [`Cell`] comparable with extracted values.
pub(crate) fn value_to_cell(value: Value) -> LoadResult<Cell> {
    let cell = match value {
        Value::Null => Cell::Null,
        Value::Boolean(b) => Cell::Integer(i64::from(b)),
        Value::TinyInt(i) => Cell::Integer(i64::from(i)),
        Value::SmallInt(i) => Cell::Integer(i64::from(i)),
        Value::Int(i) => Cell::Integer(i64::from(i)),
        Value::BigInt(i) => Cell::Integer(i),
        Value::UTinyInt(u) => Cell::Integer(i64::from(u)),
        Value::USmallInt(u) => Cell::Integer(i64::from(u)),
        Value::UInt(u) => Cell::Integer(i64::from(u)),
        Value::UBigInt(u) => i64::try_from(u)
            .map(Cell::Integer)
            .unwrap_or_else(|_| Cell::Text(u.to_string())),
        Value::HugeInt(i) => i64::try_from(i)
            .map(Cell::Integer)
            .unwrap_or_else(|_| Cell::Text(i.to_string())),
        Value::Float(f) => Cell::Float(f64::from(f)),
        Value::Double(f) => Cell::Float(f),
        Value::Decimal(d) => Cell::Text(d.to_string()),
        Value::Text(s) => Cell::Text(s),
        Value::Timestamp(unit, raw) => Cell::Timestamp(timestamp_from_raw(unit, raw)?),
        Value::Date32(days) => {
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
                .ok_or_else(|| load_error!(ErrorKind::ConversionError, "Invalid epoch date"))?;
            let date = epoch
                .checked_add_signed(chrono::Duration::days(i64::from(days)))
                .ok_or_else(|| {
                    load_error!(ErrorKind::ConversionError, "Date out of range", days)
                })?;
            Cell::Timestamp(date.and_time(chrono::NaiveTime::MIN))
        }
        other => {
            bail!(
                ErrorKind::ConversionError,
                "Unsupported DuckDB value",
                format!("{other:?}")
            );
        }
    };

    Ok(cell)
}

fn timestamp_from_raw(unit: TimeUnit, raw: i64) -> LoadResult<NaiveDateTime> {
    let micros = match unit {
        TimeUnit::Second => raw.checked_mul(1_000_000),
        TimeUnit::Millisecond => raw.checked_mul(1_000),
        TimeUnit::Microsecond => Some(raw),
        TimeUnit::Nanosecond => Some(raw / 1_000),
    };

    micros
        .and_then(DateTime::from_timestamp_micros)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| load_error!(ErrorKind::ConversionError, "Timestamp out of range", raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_survive_conversion() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 10, 0)
            .unwrap();

        let value = cell_to_value(Cell::Timestamp(ts));
        assert_eq!(value_to_cell(value).unwrap(), Cell::Timestamp(ts));
        assert_eq!(
            value_to_cell(Value::Timestamp(TimeUnit::Second, 1_704_067_800)).unwrap(),
            Cell::Timestamp(ts)
        );
    }

    #[test]
    fn narrow_integers_widen_to_i64() {
        assert_eq!(value_to_cell(Value::SmallInt(7)).unwrap(), Cell::Integer(7));
        assert_eq!(value_to_cell(Value::Int(-3)).unwrap(), Cell::Integer(-3));
        assert_eq!(value_to_cell(Value::Float(1.5)).unwrap(), Cell::Float(1.5));
    }

    #[test]
    fn unsupported_values_are_conversion_errors() {
        let err = value_to_cell(Value::Blob(vec![1, 2])).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConversionError);
    }
}
