//! Warehouse abstractions for loading extracted batches.
//!
//! The [`Warehouse`] trait is the capability surface the reconciler and upsert engine need from
//! a relational store: catalog inspection, additive DDL, scoped key lookups and bulk appends.

mod base;
pub mod memory;

pub use base::{ColumnFilter, Warehouse};
