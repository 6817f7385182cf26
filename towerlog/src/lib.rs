//! Text extraction and incremental loading engine for NRG sensor-log exports.
//!
//! The crate turns decrypted logger exports into typed [`types::RecordBatch`]es, reconciles
//! them against a [`destination::Warehouse`] and appends only rows whose key is not yet
//! stored. Processed source files are tracked through a [`store::UploadLedger`].

pub mod destination;
pub mod error;
mod macros;
pub mod metadata;
pub mod metrics;
pub mod schema;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod text;
pub mod types;
pub mod upsert;
