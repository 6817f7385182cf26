use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::error::{ErrorKind, LoadResult};
use crate::load_error;
use crate::store::ledger::{LedgerEntry, UploadLedger};

/// In-memory ledger for testing and development purposes.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    entries: Arc<Mutex<Vec<LedgerEntry>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every recorded entry in insertion order.
    pub fn entries(&self) -> LoadResult<Vec<LedgerEntry>> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> LoadResult<std::sync::MutexGuard<'_, Vec<LedgerEntry>>> {
        self.entries
            .lock()
            .map_err(|_| load_error!(ErrorKind::LedgerError, "Memory ledger lock poisoned"))
    }
}

impl UploadLedger for MemoryLedger {
    fn processed_files(&self) -> LoadResult<HashSet<String>> {
        Ok(self
            .lock()?
            .iter()
            .map(|entry| entry.file_name.clone())
            .collect())
    }

    fn record_processed(&self, entries: &[LedgerEntry]) -> LoadResult<()> {
        self.lock()?.extend_from_slice(entries);

        Ok(())
    }
}
