use std::collections::BTreeMap;

use serde::Serialize;

use crate::binding::FieldPath;
use crate::expression::Value;

/// One fully-resolved property: a literal passed through untouched, an
/// evaluated expression result, or the sentinel for a failed evaluation.
/// The sentinel renders as an empty/fallback value downstream; it never
/// aborts the node or the pass.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum PropValue {
    Literal(serde_json::Value),
    Evaluated(Value),
    Error(String),
}

impl PropValue {
    /// Scalar view; the error sentinel reads as null.
    pub fn as_value(&self) -> Value {
        match self {
            PropValue::Literal(v) => Value::from_json(v),
            PropValue::Evaluated(v) => v.clone(),
            PropValue::Error(_) => Value::Null,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, PropValue::Error(_))
    }
}

/// The fully-evaluated, expression-free property set of one node.
///
/// Owned by the resolution engine; everything downstream reads it through
/// the query layer. Maps are ordered so two identical passes produce
/// byte-identical bags.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ResolvedProps {
    /// This node's own hidden expression result.
    pub hidden: bool,
    /// A hidden ancestor suppresses the whole subtree; such nodes carry no
    /// other resolved state (their expressions were never evaluated).
    pub hidden_by_ancestor: bool,
    pub required: bool,
    pub read_only: bool,
    /// Resolved text bindings, by binding name.
    pub texts: BTreeMap<String, PropValue>,
    /// Data bindings with row indices substituted, ready for the accessor.
    pub bindings: BTreeMap<String, FieldPath>,
    /// Current value behind `simpleBinding`, when declared.
    pub value: Option<Value>,
    /// Type-specific properties: expressions evaluated, literals passed
    /// through.
    pub extra: BTreeMap<String, PropValue>,
    /// Per-property evaluation failures, by property name.
    pub errors: BTreeMap<String, String>,
}

impl ResolvedProps {
    pub fn hidden_by_ancestor() -> ResolvedProps {
        ResolvedProps {
            hidden_by_ancestor: true,
            ..ResolvedProps::default()
        }
    }

    /// Effective visibility: own expression or any ancestor.
    pub fn is_hidden(&self) -> bool {
        self.hidden || self.hidden_by_ancestor
    }

    pub fn text(&self, binding: &str) -> Option<Value> {
        self.texts.get(binding).map(PropValue::as_value)
    }

    pub fn binding(&self, name: &str) -> Option<&FieldPath> {
        self.bindings.get(name)
    }
}
