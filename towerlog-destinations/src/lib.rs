//! Warehouse and ledger implementations backed by real stores.
//!
//! Each store is compiled behind a feature of the same name.

#[cfg(feature = "duckdb")]
pub mod duckdb;
