use core::fmt;

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use super::value::Value;

/// Expression AST as it arrives in layout JSON.
///
/// The wire shape is untagged: a bare scalar is a literal, an object with a
/// single lookup key (`dataModel`, `component`, `instanceContext`) is a
/// data-source lookup, and an object with `function`/`args` is a call.
/// Function names are kept as strings here and resolved against the
/// whitelist at evaluation time, so an unknown name fails that one
/// expression instead of rejecting the whole layout.
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    Literal(Value),
    DataModel(String),
    Component(String),
    InstanceContext(String),
    Call {
        function: String,
        args: Vec<Expression>,
    },
}

impl Expression {
    /// Recognizes an expression in an arbitrary JSON property value.
    ///
    /// Returns `None` for values that are plain literals from the engine's
    /// point of view (arrays, objects without an expression shape), which
    /// pass through resolution untouched.
    pub fn detect(value: &serde_json::Value) -> Option<Expression> {
        match value {
            serde_json::Value::Object(map) => {
                if let Some(f) = map.get("function").and_then(|v| v.as_str()) {
                    let args = match map.get("args") {
                        Some(serde_json::Value::Array(items)) => items
                            .iter()
                            .map(|item| {
                                Expression::detect(item)
                                    .unwrap_or_else(|| Expression::Literal(Value::from_json(item)))
                            })
                            .collect(),
                        _ => Vec::new(),
                    };
                    return Some(Expression::Call {
                        function: f.to_string(),
                        args,
                    });
                }
                if map.len() == 1 {
                    if let Some(path) = map.get("dataModel").and_then(|v| v.as_str()) {
                        return Some(Expression::DataModel(path.to_string()));
                    }
                    if let Some(id) = map.get("component").and_then(|v| v.as_str()) {
                        return Some(Expression::Component(id.to_string()));
                    }
                    if let Some(key) = map.get("instanceContext").and_then(|v| v.as_str()) {
                        return Some(Expression::InstanceContext(key.to_string()));
                    }
                }
                None
            }
            _ => None,
        }
    }

    pub fn literal(value: impl Into<Value>) -> Expression {
        Expression::Literal(value.into())
    }

    /// True when this expression can never change: a bare literal.
    pub fn is_literal(&self) -> bool {
        matches!(self, Expression::Literal(_))
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expression::Literal(v) => write!(f, "{}", v),
            Expression::DataModel(p) => write!(f, "dataModel({})", p),
            Expression::Component(c) => write!(f, "component({})", c),
            Expression::InstanceContext(k) => write!(f, "instanceContext({})", k),
            Expression::Call { function, args } => {
                write!(f, "{}(", function)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl<'de> Deserialize<'de> for Expression {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = serde_json::Value::deserialize(deserializer)?;
        match &raw {
            serde_json::Value::Null
            | serde_json::Value::Bool(_)
            | serde_json::Value::Number(_)
            | serde_json::Value::String(_) => Ok(Expression::Literal(Value::from_json(&raw))),
            serde_json::Value::Object(_) => Expression::detect(&raw).ok_or_else(|| {
                de::Error::custom(
                    "expected a literal or an expression object ({function, args} or a data-source lookup)",
                )
            }),
            serde_json::Value::Array(_) => Err(de::Error::custom(
                "arrays are not valid expressions; wrap values in {function, args}",
            )),
        }
    }
}

impl Serialize for Expression {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Expression::Literal(v) => v.serialize(serializer),
            Expression::DataModel(p) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("dataModel", p)?;
                map.end()
            }
            Expression::Component(c) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("component", c)?;
                map.end()
            }
            Expression::InstanceContext(k) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("instanceContext", k)?;
                map.end()
            }
            Expression::Call { function, args } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("function", function)?;
                map.serialize_entry("args", args)?;
                map.end()
            }
        }
    }
}
