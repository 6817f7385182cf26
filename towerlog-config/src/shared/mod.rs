//! Configuration sections of the loader.

mod base;
mod converter;
mod ledger;
mod loader;
mod paths;
mod telemetry;
mod warehouse;

pub use base::ValidationError;
pub use converter::ConverterConfig;
pub use ledger::LedgerConfig;
pub use loader::LoaderConfig;
pub use paths::PathsConfig;
pub use telemetry::TelemetryConfig;
pub use warehouse::WarehouseConfig;
