//! Property resolution.
//!
//! Turns each node's declared (possibly expression-valued) properties into
//! a concrete, expression-free bag, re-running incrementally as the data
//! sources it read from change. A failing property yields a sentinel for
//! that property only; the node and the pass survive.

pub mod engine;
pub mod resolved;

pub use engine::{Environment, ResolutionEngine, VALUE_BINDING};
pub use resolved::{PropValue, ResolvedProps};
