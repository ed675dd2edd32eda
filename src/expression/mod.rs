//! Expression language.
//!
//! A small, explicit AST with a whitelisted function table — never dynamic
//! code execution. Expressions are pure: evaluating the same expression
//! against the same data sources is deterministic and idempotent, which the
//! resolution engine relies on for its incremental re-evaluation.
//!
//! # Components
//!
//! - [`ast`] — the wire-shape AST (`{function, args}` calls, data-source
//!   lookups, literals)
//! - [`value`] — the primitive value type and its loose coercion rules
//! - [`functions`] — the closed function whitelist
//! - [`evaluator`] — eager, depth-first evaluation with per-expression
//!   failure isolation
//! - [`sources`] — the fixed-shape record of named lookups, with read
//!   tracing for dependency-driven re-resolution

pub mod ast;
pub mod evaluator;
pub mod functions;
pub mod sources;
pub mod value;

pub use ast::Expression;
pub use evaluator::{ExprError, ExprResult, ExpressionEvaluator};
pub use functions::ExprFunction;
pub use sources::{
    ComponentLookup, ComponentValueSource, DataSources, NoComponents, OptionItem, ReadTrace,
    TextResolver,
};
pub use value::Value;
