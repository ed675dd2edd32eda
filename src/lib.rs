//! # formtree: Layout-Node Hierarchy and Expression-Resolution Engine
//!
//! formtree is the rendering core of a forms-based application framework:
//! given a JSON layout definition and a backend-supplied data model, it
//! produces a live tree of form nodes, resolves every expression-valued
//! property against application state, and keeps the tree consistent as
//! users edit data and work with repeating structures.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Layout JSON → Normalizer → Claim Graph → Node Tree → Resolution → Resolved Props
//! ```
//!
//! ### Stage 1: Normalization
//!
//! The [`layout`] module parses the flat, ID-referencing per-page component
//! arrays, canonicalizes component type names (legacy layouts used
//! inconsistent casing) and parses binding paths. Malformed pieces are
//! dropped individually and reported; a configuration error never takes
//! the page down.
//!
//! ### Stage 2: Claiming
//!
//! Container components claim their declared children, producing an
//! ownership map before any node exists. Each child has at most one owner:
//! the layout is a forest, and the first claim wins.
//!
//! ### Stage 3: Node Tree Construction
//!
//! The [`hierarchy`] module materializes one node per (component ×
//! row-path) pair. Node identity embeds ancestor row uuids, so it is
//! stable across rebuilds and row reorderings; rows renumber densely after
//! every structural change. Nodes live in a flat arena with id-reference
//! links — structural changes are cheap map edits.
//!
//! ### Stage 4: Resolution
//!
//! The [`resolve`] module evaluates each node's expression-valued
//! properties through the [`expression`] interpreter against named data
//! sources ([`binding`] supplies data-model access). Container visibility
//! resolves before children, and a hidden subtree is never evaluated.
//! Re-evaluation is incremental: each node's recorded reads decide whether
//! a change dirties it.
//!
//! ## State and Intents
//!
//! All state is owned by one [`FormEngine`] value — no globals. External
//! collaborators dispatch intents (set value, add/remove/move row, set
//! language, inject options) and read back through the query layer. User
//! edits echo immediately but trigger resolution only on a synchronous
//! [`FormEngine::flush`], which the embedding application calls after its
//! debounce window and always before navigation or save.
//!
//! ## Failure Model
//!
//! Partial degradation always beats total failure: configuration errors
//! drop the offending reference, a failing expression yields a sentinel
//! for that property only, unresolvable data paths read as null, and
//! stale node references are checked for liveness and ignored. Nothing in
//! the resolution path panics.

pub mod binding;
pub mod config;
pub mod error;
pub mod expression;
pub mod hierarchy;
pub mod layout;
pub mod resolve;
pub mod state;

// Re-exports
pub use binding::{DataModel, DataPatch, FieldPath, RowContext};
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use expression::{
    Expression, ExpressionEvaluator, ExprError, OptionItem, TextResolver, Value,
};
pub use hierarchy::{Node, NodeId, NodeTree, Row, SelectorCache};
pub use layout::{ClaimGraph, ComponentType, LayoutSet};
pub use resolve::{PropValue, ResolvedProps};
pub use state::FormEngine;
