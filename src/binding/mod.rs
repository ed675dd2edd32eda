//! Data-model binding layer.
//!
//! Paths address values inside the backend-shaped form-data object. The
//! layer owns the two textual notations (dot-bracket and slash/pointer),
//! row-relative binding substitution for repeating groups, and the
//! patch-producing accessor the engine writes through.

pub mod accessor;
pub mod path;

use thiserror::Error;

pub use accessor::{DataModel, DataPatch};
pub use path::{FieldPath, RowContext, RowEntry, Segment};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BindingError {
    #[error("Empty data-model path")]
    EmptyPath,
    #[error("Invalid data-model path '{path}' at offset {at}")]
    PathParse { path: String, at: usize },
}
