//! Metric names emitted while loading exports.

/// Label for the destination table name in metrics.
pub const TABLE_NAME_LABEL: &str = "table_name";

/// Label for the outcome of a processed file.
pub const OUTCOME_LABEL: &str = "outcome";

// Schema metrics

/// Counter for tables created by schema reconciliation.
pub const TOWERLOG_TABLES_CREATED_TOTAL: &str = "towerlog_tables_created_total";

/// Counter for columns added to existing tables.
pub const TOWERLOG_COLUMNS_ADDED_TOTAL: &str = "towerlog_columns_added_total";

// Upsert metrics

/// Counter for rows appended to warehouse tables.
pub const TOWERLOG_ROWS_INSERTED_TOTAL: &str = "towerlog_rows_inserted_total";

/// Counter for batch rows skipped because their key was already stored.
pub const TOWERLOG_ROWS_SKIPPED_TOTAL: &str = "towerlog_rows_skipped_total";

// File metrics

/// Counter for source files whose data was loaded.
pub const TOWERLOG_FILES_LOADED_TOTAL: &str = "towerlog_files_loaded_total";

/// Counter for source files that failed to load.
pub const TOWERLOG_FILES_FAILED_TOTAL: &str = "towerlog_files_failed_total";
