use crate::error::LoadResult;
use crate::types::{Cell, ColumnSchema, TableRow};

/// Restricts a key lookup to rows whose `column` equals `value`.
#[derive(Debug, Clone, Copy)]
pub struct ColumnFilter<'a> {
    pub column: &'a str,
    pub value: &'a Cell,
}

/// Relational store receiving extracted batches.
///
/// All operations are blocking. Table and column names are matched case-insensitively, and an
/// implementation should acquire its connection per call and release it on every exit path.
/// Errors from the store are returned unchanged; callers decide whether to retry.
pub trait Warehouse {
    /// Returns whether `table_name` exists.
    fn table_exists(&self, table_name: &str) -> LoadResult<bool>;

    /// Returns the column names of `table_name` in table order.
    fn table_columns(&self, table_name: &str) -> LoadResult<Vec<String>>;

    /// Creates `table_name` with the given columns.
    ///
    /// Columns flagged with [`ColumnSchema::primary_key`] form the primary key. Creating a table
    /// that already exists is a no-op.
    fn create_table(&self, table_name: &str, columns: &[ColumnSchema]) -> LoadResult<()>;

    /// Adds `column` to an existing table.
    fn add_column(&self, table_name: &str, column: &ColumnSchema) -> LoadResult<()>;

    /// Returns every value of `column`, optionally restricted by `filter`.
    fn select_column(
        &self,
        table_name: &str,
        column: &str,
        filter: Option<ColumnFilter<'_>>,
    ) -> LoadResult<Vec<Cell>>;

    /// Appends `rows` whose values follow `columns`, returning the number of rows written.
    ///
    /// Values are matched to table columns by name, so the table may hold additional columns
    /// or a different column order. Missing table columns receive nulls.
    fn append_rows(
        &self,
        table_name: &str,
        columns: &[ColumnSchema],
        rows: Vec<TableRow>,
    ) -> LoadResult<usize>;
}
