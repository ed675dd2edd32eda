use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::evaluator::ExprError;
use super::value::Value;
use crate::binding::{DataModel, FieldPath, RowContext};

/// One entry of an externally-fetched options list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptionItem {
    pub value: String,
    pub label: String,
}

/// Externally-supplied translation lookup. The engine never owns
/// translation tables; it only calls through this seam.
pub trait TextResolver {
    fn resolve(&self, key: &str) -> Option<String>;
}

impl TextResolver for HashMap<String, String> {
    fn resolve(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Result of looking up another component's value: the scalar (if any) plus
/// the data path that was read to produce it, so the caller can record the
/// underlying dependency.
#[derive(Clone, Debug, Default)]
pub struct ComponentLookup {
    pub value: Option<Value>,
    pub read_path: Option<FieldPath>,
}

/// Seam through which expressions read other components' values. Backed by
/// the node tree in the engine; tests substitute small fakes.
pub trait ComponentValueSource {
    fn component_value(&self, component_id: &str, ctx: &RowContext) -> ComponentLookup;
}

/// No components available. Used for detached evaluation.
pub struct NoComponents;

impl ComponentValueSource for NoComponents {
    fn component_value(&self, _component_id: &str, _ctx: &RowContext) -> ComponentLookup {
        ComponentLookup::default()
    }
}

/// Everything one evaluation read from its data sources. Stored per node by
/// the resolution engine; a later change overlapping any recorded read
/// marks the node dirty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReadTrace {
    pub data_paths: HashSet<FieldPath>,
    pub options: HashSet<String>,
    pub components: HashSet<String>,
    pub texts: HashSet<String>,
    pub language: bool,
    pub instance: bool,
}

impl ReadTrace {
    pub fn merge(&mut self, other: &ReadTrace) {
        self.data_paths.extend(other.data_paths.iter().cloned());
        self.options.extend(other.options.iter().cloned());
        self.components.extend(other.components.iter().cloned());
        self.texts.extend(other.texts.iter().cloned());
        self.language |= other.language;
        self.instance |= other.instance;
    }

    pub fn reads_path(&self, changed: &FieldPath) -> bool {
        self.data_paths.iter().any(|read| read.overlaps(changed))
    }
}

/// The fixed-shape record of named lookups available to one evaluation,
/// scoped to a node's row context. Every read is recorded into the trace.
pub struct DataSources<'a> {
    data: &'a DataModel,
    options: &'a HashMap<String, Vec<OptionItem>>,
    language: &'a str,
    texts: &'a dyn TextResolver,
    instance: &'a HashMap<String, String>,
    components: &'a dyn ComponentValueSource,
    row_context: &'a RowContext,
    trace: RefCell<ReadTrace>,
}

impl<'a> DataSources<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        data: &'a DataModel,
        options: &'a HashMap<String, Vec<OptionItem>>,
        language: &'a str,
        texts: &'a dyn TextResolver,
        instance: &'a HashMap<String, String>,
        components: &'a dyn ComponentValueSource,
        row_context: &'a RowContext,
    ) -> Self {
        Self {
            data,
            options,
            language,
            texts,
            instance,
            components,
            row_context,
            trace: RefCell::new(ReadTrace::default()),
        }
    }

    pub fn row_context(&self) -> &RowContext {
        self.row_context
    }

    /// Resolves a `dataModel` lookup against the node's row context.
    /// Missing values read as null (binding misses are not errors); a path
    /// that does not parse fails this one expression.
    pub fn data_model(&self, binding: &str) -> Result<Value, ExprError> {
        let path = FieldPath::parse(binding)
            .map_err(|e| ExprError::Lookup(format!("dataModel '{}': {}", binding, e)))?;
        let absolute = self.row_context.substitute(&path);
        self.trace.borrow_mut().data_paths.insert(absolute.clone());
        Ok(self
            .data
            .read(&absolute)
            .map(Value::from_json)
            .unwrap_or(Value::Null))
    }

    /// Reads an already-substituted absolute path, recording the
    /// dependency. Used by the resolution engine for bound values.
    pub fn data_model_at(&self, absolute: &FieldPath) -> Value {
        self.trace.borrow_mut().data_paths.insert(absolute.clone());
        self.data
            .read(absolute)
            .map(Value::from_json)
            .unwrap_or(Value::Null)
    }

    /// Reads another component's current value. Unknown ids fail the
    /// expression; hidden components read as null (handled by the source).
    pub fn component(&self, component_id: &str) -> Result<Value, ExprError> {
        self.trace
            .borrow_mut()
            .components
            .insert(component_id.to_string());
        let lookup = self.components.component_value(component_id, self.row_context);
        if let Some(path) = lookup.read_path {
            self.trace.borrow_mut().data_paths.insert(path);
        }
        lookup
            .value
            .ok_or_else(|| ExprError::Lookup(format!("unknown component '{}'", component_id)))
    }

    pub fn instance(&self, key: &str) -> Result<Value, ExprError> {
        self.trace.borrow_mut().instance = true;
        self.instance
            .get(key)
            .map(|v| Value::String(v.clone()))
            .ok_or_else(|| ExprError::Lookup(format!("unknown instance context key '{}'", key)))
    }

    pub fn language(&self) -> Value {
        self.trace.borrow_mut().language = true;
        Value::String(self.language.to_string())
    }

    /// Translation lookup; a missing key falls back to the key itself.
    pub fn text(&self, key: &str) -> Value {
        self.trace.borrow_mut().texts.insert(key.to_string());
        self.trace.borrow_mut().language = true;
        match self.texts.resolve(key) {
            Some(text) => Value::String(text),
            None => {
                debug!(key, "text resource key not found, using key as fallback");
                Value::String(key.to_string())
            }
        }
    }

    /// Label of the option whose value matches, from the named options
    /// list. Null until the list is loaded or when no option matches.
    pub fn option_label(&self, options_id: &str, value: &Value) -> Value {
        self.trace.borrow_mut().options.insert(options_id.to_string());
        let needle = value.to_display_string();
        self.options
            .get(options_id)
            .and_then(|items| items.iter().find(|item| item.value == needle))
            .map(|item| Value::String(item.label.clone()))
            .unwrap_or(Value::Null)
    }

    pub fn into_trace(self) -> ReadTrace {
        self.trace.into_inner()
    }

    pub fn trace_snapshot(&self) -> ReadTrace {
        self.trace.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sources_fixture<'a>(
        data: &'a DataModel,
        options: &'a HashMap<String, Vec<OptionItem>>,
        texts: &'a HashMap<String, String>,
        instance: &'a HashMap<String, String>,
        ctx: &'a RowContext,
    ) -> DataSources<'a> {
        DataSources::new(data, options, "nb", texts, instance, &NoComponents, ctx)
    }

    #[test]
    fn test_data_model_records_absolute_path() {
        let data = DataModel::new(json!({"group": [{"field": "x"}]}));
        let options = HashMap::new();
        let texts = HashMap::new();
        let instance = HashMap::new();
        let ctx = RowContext(vec![crate::binding::RowEntry {
            binding: FieldPath::parse("group").unwrap(),
            uuid: uuid::Uuid::new_v4(),
            index: 0,
        }]);
        let sources = sources_fixture(&data, &options, &texts, &instance, &ctx);
        assert_eq!(sources.data_model("group.field").unwrap(), Value::from("x"));
        let trace = sources.into_trace();
        assert!(trace
            .data_paths
            .contains(&FieldPath::parse("group[0].field").unwrap()));
    }

    #[test]
    fn test_missing_data_reads_null() {
        let data = DataModel::empty();
        let options = HashMap::new();
        let texts = HashMap::new();
        let instance = HashMap::new();
        let ctx = RowContext::empty();
        let sources = sources_fixture(&data, &options, &texts, &instance, &ctx);
        assert_eq!(sources.data_model("nothing.here").unwrap(), Value::Null);
    }

    #[test]
    fn test_option_label() {
        let data = DataModel::empty();
        let mut options = HashMap::new();
        options.insert(
            "countries".to_string(),
            vec![OptionItem {
                value: "no".to_string(),
                label: "Norway".to_string(),
            }],
        );
        let texts = HashMap::new();
        let instance = HashMap::new();
        let ctx = RowContext::empty();
        let sources = sources_fixture(&data, &options, &texts, &instance, &ctx);
        assert_eq!(
            sources.option_label("countries", &Value::from("no")),
            Value::from("Norway")
        );
        assert_eq!(
            sources.option_label("countries", &Value::from("se")),
            Value::Null
        );
        assert!(sources.trace_snapshot().options.contains("countries"));
    }
}
