use std::cell::Cell;
use std::str::FromStr;

use thiserror::Error;

use super::ast::Expression;
use super::functions::{self, ExprFunction};
use super::sources::DataSources;
use super::value::Value;

pub type ExprResult<T> = Result<T, ExprError>;

/// Failure of one expression. Never aborts anything beyond the property
/// being resolved; the resolution engine turns it into a sentinel value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("Unknown function: {0}")]
    UnknownFunction(String),
    #[error("Wrong argument count for {function}: expected {expected}, found {found}")]
    ArgCount {
        function: String,
        expected: String,
        found: usize,
    },
    #[error("Wrong argument type for {function}: argument {index} expected {expected}, found '{found}'")]
    ArgType {
        function: String,
        index: usize,
        expected: String,
        found: String,
    },
    #[error("Lookup failed: {0}")]
    Lookup(String),
    #[error("Expression nesting exceeds limit of {0}")]
    DepthExceeded(usize),
}

/// Pure, synchronous expression interpreter.
///
/// Arguments evaluate eagerly, depth-first, bottom-up; the same expression
/// against the same sources always yields the same value. The call counter
/// exists so callers can verify that hidden subtrees are never evaluated.
pub struct ExpressionEvaluator {
    max_depth: usize,
    evaluations: Cell<u64>,
}

impl Default for ExpressionEvaluator {
    fn default() -> Self {
        Self::new(crate::config::default_max_expression_depth())
    }
}

impl ExpressionEvaluator {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            evaluations: Cell::new(0),
        }
    }

    pub fn evaluate(&self, expr: &Expression, sources: &DataSources<'_>) -> ExprResult<Value> {
        self.eval_inner(expr, sources, 0)
    }

    /// Total expression nodes evaluated since construction or the last
    /// [`reset_evaluation_count`](Self::reset_evaluation_count).
    pub fn evaluation_count(&self) -> u64 {
        self.evaluations.get()
    }

    pub fn reset_evaluation_count(&self) {
        self.evaluations.set(0);
    }

    fn eval_inner(
        &self,
        expr: &Expression,
        sources: &DataSources<'_>,
        depth: usize,
    ) -> ExprResult<Value> {
        self.evaluations.set(self.evaluations.get() + 1);
        match expr {
            Expression::Literal(value) => Ok(value.clone()),
            Expression::DataModel(binding) => sources.data_model(binding),
            Expression::Component(id) => sources.component(id),
            Expression::InstanceContext(key) => sources.instance(key),
            Expression::Call { function, args } => {
                if depth >= self.max_depth {
                    return Err(ExprError::DepthExceeded(self.max_depth));
                }
                let function = ExprFunction::from_str(function)
                    .map_err(|_| ExprError::UnknownFunction(function.clone()))?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval_inner(arg, sources, depth + 1)?);
                }
                functions::apply(function, &values, sources)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::binding::{DataModel, RowContext};
    use crate::expression::sources::NoComponents;

    struct Fixture {
        data: DataModel,
        options: HashMap<String, Vec<crate::expression::OptionItem>>,
        texts: HashMap<String, String>,
        instance: HashMap<String, String>,
        ctx: RowContext,
    }

    impl Fixture {
        fn new(data: serde_json::Value) -> Self {
            Self {
                data: DataModel::new(data),
                options: HashMap::new(),
                texts: HashMap::new(),
                instance: HashMap::new(),
                ctx: RowContext::empty(),
            }
        }

        fn sources(&self) -> DataSources<'_> {
            DataSources::new(
                &self.data,
                &self.options,
                "nb",
                &self.texts,
                &self.instance,
                &NoComponents,
                &self.ctx,
            )
        }
    }

    fn expr(json: serde_json::Value) -> Expression {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_equals_data_model_lookup() {
        let fixture = Fixture::new(json!({"age": 18}));
        let evaluator = ExpressionEvaluator::default();
        let e = expr(json!({"function": "equals", "args": [{"dataModel": "age"}, 18]}));
        assert_eq!(
            evaluator.evaluate(&e, &fixture.sources()).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_greater_than_non_numeric_is_error_not_panic() {
        let fixture = Fixture::new(json!({}));
        let evaluator = ExpressionEvaluator::default();
        let e = expr(json!({"function": "greaterThan", "args": [5, "x"]}));
        let err = evaluator.evaluate(&e, &fixture.sources()).unwrap_err();
        assert!(matches!(err, ExprError::ArgType { .. }));
    }

    #[test]
    fn test_unknown_function_is_error() {
        let fixture = Fixture::new(json!({}));
        let evaluator = ExpressionEvaluator::default();
        let e = expr(json!({"function": "frobnicate", "args": []}));
        assert_eq!(
            evaluator.evaluate(&e, &fixture.sources()).unwrap_err(),
            ExprError::UnknownFunction("frobnicate".to_string())
        );
    }

    #[test]
    fn test_nested_bottom_up_evaluation() {
        let fixture = Fixture::new(json!({"a": 2, "b": 3}));
        let evaluator = ExpressionEvaluator::default();
        let e = expr(json!({
            "function": "and",
            "args": [
                {"function": "lessThan", "args": [{"dataModel": "a"}, {"dataModel": "b"}]},
                {"function": "not", "args": [{"function": "equals", "args": [{"dataModel": "a"}, {"dataModel": "b"}]}]}
            ]
        }));
        assert_eq!(
            evaluator.evaluate(&e, &fixture.sources()).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_loose_comparison_numeric_string() {
        let fixture = Fixture::new(json!({"count": "5"}));
        let evaluator = ExpressionEvaluator::default();
        let e = expr(json!({"function": "greaterThan", "args": [{"dataModel": "count"}, 3]}));
        assert_eq!(
            evaluator.evaluate(&e, &fixture.sources()).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_concat_renders_null_as_empty() {
        let fixture = Fixture::new(json!({"name": "Ada"}));
        let evaluator = ExpressionEvaluator::default();
        let e = expr(json!({
            "function": "concat",
            "args": ["Hello ", {"dataModel": "name"}, {"dataModel": "missing"}, "!"]
        }));
        assert_eq!(
            evaluator.evaluate(&e, &fixture.sources()).unwrap(),
            Value::from("Hello Ada!")
        );
    }

    #[test]
    fn test_if_with_and_without_else() {
        let fixture = Fixture::new(json!({}));
        let evaluator = ExpressionEvaluator::default();
        let e = expr(json!({"function": "if", "args": [true, "yes", "no"]}));
        assert_eq!(
            evaluator.evaluate(&e, &fixture.sources()).unwrap(),
            Value::from("yes")
        );
        let e = expr(json!({"function": "if", "args": [false, "yes"]}));
        assert_eq!(evaluator.evaluate(&e, &fixture.sources()).unwrap(), Value::Null);
    }

    #[test]
    fn test_format_date() {
        let fixture = Fixture::new(json!({}));
        let evaluator = ExpressionEvaluator::default();
        let e = expr(json!({"function": "formatDate", "args": ["2024-03-01", "%d.%m.%Y"]}));
        assert_eq!(
            evaluator.evaluate(&e, &fixture.sources()).unwrap(),
            Value::from("01.03.2024")
        );
        let e = expr(json!({"function": "formatDate", "args": ["not a date"]}));
        assert!(evaluator.evaluate(&e, &fixture.sources()).is_err());
    }

    #[test]
    fn test_format_date_bad_format_is_error_not_panic() {
        let fixture = Fixture::new(json!({}));
        let evaluator = ExpressionEvaluator::default();
        // Invalid specifier.
        let e = expr(json!({"function": "formatDate", "args": ["2024-03-01", "%Q"]}));
        let err = evaluator.evaluate(&e, &fixture.sources()).unwrap_err();
        assert!(matches!(err, ExprError::ArgType { index: 1, .. }));
        // Valid specifier the date-only value cannot satisfy.
        let e = expr(json!({"function": "formatDate", "args": ["2024-03-01", "%H:%M"]}));
        assert!(evaluator.evaluate(&e, &fixture.sources()).is_err());
    }

    #[test]
    fn test_depth_limit() {
        let fixture = Fixture::new(json!({}));
        let evaluator = ExpressionEvaluator::new(3);
        let mut e = json!(true);
        for _ in 0..5 {
            e = json!({"function": "not", "args": [e]});
        }
        let err = evaluator.evaluate(&expr(e), &fixture.sources()).unwrap_err();
        assert_eq!(err, ExprError::DepthExceeded(3));
    }

    #[test]
    fn test_evaluation_count_instrumentation() {
        let fixture = Fixture::new(json!({}));
        let evaluator = ExpressionEvaluator::default();
        let e = expr(json!({"function": "not", "args": [true]}));
        evaluator.evaluate(&e, &fixture.sources()).unwrap();
        // One call node plus one literal argument.
        assert_eq!(evaluator.evaluation_count(), 2);
        evaluator.reset_evaluation_count();
        assert_eq!(evaluator.evaluation_count(), 0);
    }

    #[test]
    fn test_idempotent_evaluation() {
        let fixture = Fixture::new(json!({"x": 41}));
        let evaluator = ExpressionEvaluator::default();
        let e = expr(json!({"function": "concat", "args": [{"dataModel": "x"}, "!"]}));
        let first = evaluator.evaluate(&e, &fixture.sources()).unwrap();
        let second = evaluator.evaluate(&e, &fixture.sources()).unwrap();
        assert_eq!(first, second);
    }
}
