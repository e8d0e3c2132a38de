//! Document model shared by the store, the archive codec and the migrator.

mod document;
mod value;

pub use document::{Document, PATH_SEPARATOR};
pub use value::Value;
