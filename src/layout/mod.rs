//! Layout parsing and the claim graph.
//!
//! Raw per-page layout arrays are flat: containers reference their children
//! by string id. Normalization canonicalizes component type names and
//! parses binding paths; the claim graph then records which container owns
//! which child, before any node exists. Configuration errors never abort a
//! page — the offending piece is dropped and reported.

pub mod claims;
pub mod component;

use thiserror::Error;

pub use claims::ClaimGraph;
pub use component::{Component, ComponentType, LayoutSet, Page, RawComponent};

/// Fatal layout problems: the JSON does not have the expected shape at all.
#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("Invalid layout shape: {0}")]
    InvalidShape(String),
}

/// Recoverable configuration errors, collected while normalizing and
/// claiming. Each is logged once at the point it is found.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutDiagnostic {
    #[error("page '{page}': component '{id}' has unknown type '{type_name}'")]
    UnknownComponentType {
        page: String,
        id: String,
        type_name: String,
    },
    #[error("page '{page}': duplicate component id '{id}'")]
    DuplicateComponentId { page: String, id: String },
    #[error("page '{page}': component '{id}' is not a container but declares children")]
    ChildrenOnNonContainer { page: String, id: String },
    #[error("page '{page}': component '{id}' binding '{binding}' has invalid path '{path}'")]
    InvalidBinding {
        page: String,
        id: String,
        binding: String,
        path: String,
    },
    #[error("page '{page}': container '{parent}' references nonexistent child '{child}'")]
    DanglingChild {
        page: String,
        parent: String,
        child: String,
    },
    #[error("page '{page}': child '{child}' claimed by both '{first}' and '{second}'")]
    DuplicateClaim {
        page: String,
        child: String,
        first: String,
        second: String,
    },
}
