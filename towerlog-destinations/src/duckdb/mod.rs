mod core;
mod ledger;
mod schema;

pub use core::DuckDbWarehouse;
pub use ledger::{DuckDbLedger, LEDGER_TABLE};
pub use schema::{added_column_type, created_column_type};
