use std::collections::HashSet;

use chrono::NaiveDateTime;

use crate::error::LoadResult;

/// A source file considered fully processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub file_name: String,
    pub upload_timestamp: NaiveDateTime,
    pub uploaded_by: String,
}

/// Trait for the append-only ledger of processed source files.
///
/// Entries are never updated or deleted. Excluding ledgered file names from later runs is what
/// keeps a file from being processed twice.
pub trait UploadLedger {
    /// Returns the names of every file recorded so far.
    fn processed_files(&self) -> LoadResult<HashSet<String>>;

    /// Appends `entries` to the ledger.
    fn record_processed(&self, entries: &[LedgerEntry]) -> LoadResult<()>;
}
