//! Parsing of decrypted logger exports.
//!
//! Exports mix `key: value` parameter sections, repeated channel sub-blocks and a
//! tab-delimited measurement table. Every parser here works on a read-only
//! [`TextDocument`] addressed by 1-based line numbers.

mod channels;
mod document;
mod scanner;
mod table;

pub use channels::*;
pub use document::*;
pub use scanner::*;
pub use table::*;
