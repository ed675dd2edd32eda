use chrono::{DateTime, NaiveDate, NaiveDateTime};
use strum_macros::{Display, EnumString};

use super::evaluator::ExprError;
use super::sources::DataSources;
use super::value::Value;

/// The closed, whitelisted function table. Names match the layout JSON
/// tags; parsing is exact (tags are camelCase on the wire).
///
/// Comparison semantics are deliberately loose (JavaScript-style coercion)
/// for backward compatibility with existing layouts. Introducing strict
/// typing here would be a breaking change for any layout that compares a
/// numeric string against a number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "camelCase")]
pub enum ExprFunction {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanEq,
    LessThan,
    LessThanEq,
    And,
    Or,
    Not,
    If,
    Concat,
    UpperCase,
    LowerCase,
    StringLength,
    Contains,
    Round,
    FormatDate,
    Language,
    Text,
    OptionLabel,
}

impl ExprFunction {
    /// Expected argument count; `None` means variadic.
    fn arity(&self) -> Option<std::ops::RangeInclusive<usize>> {
        match self {
            ExprFunction::Equals
            | ExprFunction::NotEquals
            | ExprFunction::GreaterThan
            | ExprFunction::GreaterThanEq
            | ExprFunction::LessThan
            | ExprFunction::LessThanEq
            | ExprFunction::Contains
            | ExprFunction::OptionLabel => Some(2..=2),
            ExprFunction::Not
            | ExprFunction::UpperCase
            | ExprFunction::LowerCase
            | ExprFunction::StringLength
            | ExprFunction::Text => Some(1..=1),
            ExprFunction::If => Some(2..=3),
            ExprFunction::Round => Some(1..=2),
            ExprFunction::FormatDate => Some(1..=2),
            ExprFunction::Language => Some(0..=0),
            ExprFunction::And | ExprFunction::Or | ExprFunction::Concat => None,
        }
    }
}

/// Applies a function to already-evaluated arguments. Argument evaluation
/// is eager and depth-first in the evaluator; by the time we get here every
/// arg is a concrete [`Value`].
pub fn apply(
    function: ExprFunction,
    args: &[Value],
    sources: &DataSources<'_>,
) -> Result<Value, ExprError> {
    if let Some(range) = function.arity() {
        if !range.contains(&args.len()) {
            return Err(ExprError::ArgCount {
                function: function.to_string(),
                expected: format!("{}..={}", range.start(), range.end()),
                found: args.len(),
            });
        }
    }
    match function {
        ExprFunction::Equals => Ok(Value::Bool(args[0].loose_eq(&args[1]))),
        ExprFunction::NotEquals => Ok(Value::Bool(!args[0].loose_eq(&args[1]))),
        ExprFunction::GreaterThan => compare(function, args, |a, b| a > b),
        ExprFunction::GreaterThanEq => compare(function, args, |a, b| a >= b),
        ExprFunction::LessThan => compare(function, args, |a, b| a < b),
        ExprFunction::LessThanEq => compare(function, args, |a, b| a <= b),
        ExprFunction::And => Ok(Value::Bool(args.iter().all(Value::truthy))),
        ExprFunction::Or => Ok(Value::Bool(args.iter().any(Value::truthy))),
        ExprFunction::Not => Ok(Value::Bool(!args[0].truthy())),
        ExprFunction::If => {
            if args[0].truthy() {
                Ok(args[1].clone())
            } else {
                Ok(args.get(2).cloned().unwrap_or(Value::Null))
            }
        }
        ExprFunction::Concat => Ok(Value::String(
            args.iter().map(Value::to_display_string).collect(),
        )),
        ExprFunction::UpperCase => Ok(Value::String(args[0].to_display_string().to_uppercase())),
        ExprFunction::LowerCase => Ok(Value::String(args[0].to_display_string().to_lowercase())),
        ExprFunction::StringLength => Ok(Value::Number(
            args[0].to_display_string().chars().count() as f64,
        )),
        ExprFunction::Contains => Ok(Value::Bool(
            args[0]
                .to_display_string()
                .contains(&args[1].to_display_string()),
        )),
        ExprFunction::Round => round(function, args),
        ExprFunction::FormatDate => format_date(function, args),
        ExprFunction::Language => Ok(sources.language()),
        ExprFunction::Text => Ok(sources.text(&args[0].to_display_string())),
        ExprFunction::OptionLabel => {
            Ok(sources.option_label(&args[0].to_display_string(), &args[1]))
        }
    }
}

// Ordering comparisons coerce both sides to numbers. A side that does not
// coerce (a non-numeric string) is an evaluation error rather than a
// silent false; misconfigured layouts surface instead of hiding fields.
fn compare(
    function: ExprFunction,
    args: &[Value],
    op: fn(f64, f64) -> bool,
) -> Result<Value, ExprError> {
    let a = coerce_number(function, 0, &args[0])?;
    let b = coerce_number(function, 1, &args[1])?;
    Ok(Value::Bool(op(a, b)))
}

fn coerce_number(function: ExprFunction, index: usize, value: &Value) -> Result<f64, ExprError> {
    value.to_number().ok_or_else(|| ExprError::ArgType {
        function: function.to_string(),
        index,
        expected: "number".to_string(),
        found: value.to_string(),
    })
}

fn round(function: ExprFunction, args: &[Value]) -> Result<Value, ExprError> {
    let number = coerce_number(function, 0, &args[0])?;
    let precision = match args.get(1) {
        Some(p) => coerce_number(function, 1, p)?.max(0.0) as usize,
        None => 0,
    };
    Ok(Value::String(format!("{:.*}", precision, number)))
}

fn format_date(function: ExprFunction, args: &[Value]) -> Result<Value, ExprError> {
    let raw = args[0].to_display_string();
    let format = match args.get(1) {
        Some(f) => f.to_display_string(),
        None => "%Y-%m-%d".to_string(),
    };
    let formatted = if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        render_format(function, dt.format(&format), &format)?
    } else if let Ok(dt) = NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S") {
        render_format(function, dt.format(&format), &format)?
    } else if let Ok(d) = NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        render_format(function, d.format(&format), &format)?
    } else {
        return Err(ExprError::ArgType {
            function: function.to_string(),
            index: 0,
            expected: "ISO-8601 date".to_string(),
            found: raw,
        });
    };
    Ok(Value::String(formatted))
}

// chrono reports an invalid or inapplicable specifier only when the
// DelayedFormat renders, and `to_string` panics on that Display error.
// Writing into a buffer surfaces it as a value instead.
fn render_format(
    function: ExprFunction,
    delayed: impl std::fmt::Display,
    format: &str,
) -> Result<String, ExprError> {
    use std::fmt::Write;

    let mut out = String::new();
    write!(out, "{}", delayed).map_err(|_| ExprError::ArgType {
        function: function.to_string(),
        index: 1,
        expected: "valid strftime format".to_string(),
        found: format.to_string(),
    })?;
    Ok(out)
}
