use crate::bail;
use crate::error::{ErrorKind, LoadResult};
use crate::types::{Cell, ColumnKind, ColumnSchema, TableRow};

/// An in-memory tabular set of typed rows produced by extraction.
///
/// Every row holds exactly one value per column. A batch is owned by the run that extracted it
/// until it is handed over to [`crate::upsert::upsert_new`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordBatch {
    columns: Vec<ColumnSchema>,
    rows: Vec<TableRow>,
}

impl RecordBatch {
    /// Creates a batch after checking that every row matches the column count.
    pub fn new(columns: Vec<ColumnSchema>, rows: Vec<TableRow>) -> LoadResult<Self> {
        if let Some(index) = rows
            .iter()
            .position(|row| row.values().len() != columns.len())
        {
            bail!(
                ErrorKind::InvalidData,
                "Row width does not match batch columns",
                format!(
                    "row {index} has {} values, batch has {} columns",
                    rows[index].values().len(),
                    columns.len()
                )
            );
        }

        Ok(Self { columns, rows })
    }

    /// Creates a batch from rows already built against `columns`.
    pub(crate) fn from_aligned(columns: Vec<ColumnSchema>, rows: Vec<TableRow>) -> Self {
        debug_assert!(rows.iter().all(|row| row.values().len() == columns.len()));

        Self { columns, rows }
    }

    /// Creates a batch with neither columns nor rows.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a single-row batch of text columns from ordered `(name, value)` pairs.
    pub fn single_text_row<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let (columns, values): (Vec<_>, Vec<_>) = pairs
            .into_iter()
            .map(|(name, value)| {
                (
                    ColumnSchema::new(name, ColumnKind::Text),
                    Cell::Text(value.into()),
                )
            })
            .unzip();

        Self {
            columns,
            rows: vec![TableRow::new(values)],
        }
    }

    /// Returns `true` when the batch holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    /// Returns the position of the column with exactly this name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    /// Returns the position of the column matching `name`, preferring an exact match and
    /// falling back to a case-insensitive one.
    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.column_index(name).or_else(|| {
            self.columns
                .iter()
                .position(|column| column.name.eq_ignore_ascii_case(name))
        })
    }

    /// Returns the value at `row` and `column`, if both exist.
    pub fn value(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|row| row.values().get(column))
    }

    /// Sets every row's value of `name` to `value`, appending the column when it is missing.
    ///
    /// An existing column keeps its position but takes the kind of `value`.
    pub fn set_constant_column(&mut self, name: &str, value: Cell) {
        let kind = value.kind().unwrap_or(ColumnKind::Text);

        match self.column_index(name) {
            Some(index) => {
                self.columns[index].kind = kind;
                for row in &mut self.rows {
                    row.values_mut()[index] = value.clone();
                }
            }
            None => {
                self.columns.push(ColumnSchema::new(name, kind));
                for row in &mut self.rows {
                    row.values_mut().push(value.clone());
                }
            }
        }
    }

    /// Keeps only the rows for which `keep` returns `true`.
    pub fn retain_rows<F>(&mut self, keep: F)
    where
        F: FnMut(&TableRow) -> bool,
    {
        self.rows.retain(keep);
    }

    /// Consumes the batch and returns its columns and rows.
    pub fn into_parts(self) -> (Vec<ColumnSchema>, Vec<TableRow>) {
        (self.columns, self.rows)
    }
}
