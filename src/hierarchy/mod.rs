//! Node hierarchy.
//!
//! The hierarchy turns the flat claim graph into addressable nodes: one per
//! (component, row-path) pair. Nodes live in a flat arena keyed by stable
//! identity; parent/child links are id references, so row mutations are
//! cheap map edits rather than graph rewrites.

pub mod builder;
pub mod node;
pub mod row;
pub mod tree;

use thiserror::Error;

pub use builder::{build_tree, GROUP_BINDING};
pub use node::{Node, NodeId};
pub use row::{Row, RowState};
pub use tree::{NodeTree, SelectorCache};

// Node ids appear in string form so error values stay cheap to clone and
// compare in tests.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HierarchyError {
    #[error("'{0}' is not a live repeating container")]
    UnknownContainer(String),
    #[error("Row index {index} out of range for '{container}' (len {len})")]
    RowOutOfRange {
        container: String,
        index: usize,
        len: usize,
    },
}
