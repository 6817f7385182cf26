mod base;
pub mod memory;

pub use base::{LedgerEntry, UploadLedger};
