//! Durable record of which source files were fully processed.

pub mod ledger;

pub use ledger::{LedgerEntry, UploadLedger};
