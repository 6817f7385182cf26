//! Typed values, column schemas and record batches shared by every stage of a load.

mod batch;
mod cell;
mod schema;
mod table_row;

pub use batch::*;
pub use cell::*;
pub use schema::*;
pub use table_row::*;
