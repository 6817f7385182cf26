//! Reconciliation of warehouse tables with extracted batches.

mod reconcile;

pub use reconcile::*;
