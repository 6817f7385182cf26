//! Logging and metrics initialisation shared by the loader binary and tests.

pub mod metrics;
pub mod tracing;
