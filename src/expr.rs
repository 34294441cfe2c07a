//! Sandboxed expression evaluation for transform and condition steps.
//!
//! Expressions are JEXL (`jexl-eval`): field access, indexing, arithmetic,
//! comparisons, `in`, `&&`/`||`, ternaries, and `value|transform(args)`
//! pipes. Only the transforms registered here are callable; nothing in the
//! host environment is reachable.
//!
//! Data is always passed as context, never interpolated into the
//! expression text.

use std::sync::OnceLock;

use regex_lite::Regex;
use serde_json::{json, Map, Number, Value};

use crate::template::Scope;

/// Maximum bracket nesting accepted in an expression.
pub const MAX_DEPTH: usize = 64;

/// Transforms callable with `value|name(args)`.
pub const TRANSFORMS: &[&str] = &[
    "len", "length", "lower", "upper", "trim", "contains", "startsWith", "endsWith", "split",
    "join", "keys", "values", "sum", "min", "max", "abs", "round", "floor", "ceil", "number",
    "string", "bool", "not", "first", "last", "isEmpty", "default", "map", "filter", "toJson",
    "fromJson",
];

/// Errors that can occur during expression evaluation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    #[error("Empty expression")]
    Empty,

    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    #[error("Expression nested deeper than 64 levels")]
    TooDeep,

    #[error("Unbalanced brackets at position {0}")]
    Unbalanced(usize),

    #[error("Expression evaluation failed: {0}")]
    EvalFailed(String),
}

fn transform_regex() -> &'static Regex {
    static TRANSFORM: OnceLock<Regex> = OnceLock::new();
    TRANSFORM.get_or_init(|| {
        Regex::new(r"(?:^|[^|])\|\s*([A-Za-z_][A-Za-z0-9_]*)").expect("valid regex")
    })
}

/// Replace quoted string contents with spaces so structural checks skip them.
fn blank_strings(expression: &str) -> String {
    let mut out = String::with_capacity(expression.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in expression.chars() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                    out.push(' ');
                } else if c == '\\' {
                    escaped = true;
                    out.push(' ');
                } else if c == q {
                    quote = None;
                    out.push(c);
                } else {
                    out.push(' ');
                }
            }
            None => {
                if c == '\'' || c == '"' {
                    quote = Some(c);
                }
                out.push(c);
            }
        }
    }
    out
}

/// Reject expressions that are empty, too deeply nested, or that call an
/// unregistered transform.
pub fn check(expression: &str) -> Result<(), ExprError> {
    if expression.trim().is_empty() {
        return Err(ExprError::Empty);
    }

    let code = blank_strings(expression);

    let mut depth = 0usize;
    for (position, c) in code.chars().enumerate() {
        match c {
            '(' | '[' | '{' => {
                depth += 1;
                if depth > MAX_DEPTH {
                    return Err(ExprError::TooDeep);
                }
            }
            ')' | ']' | '}' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or(ExprError::Unbalanced(position))?;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(ExprError::Unbalanced(code.chars().count()));
    }

    for caps in transform_regex().captures_iter(&code) {
        let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        if !TRANSFORMS.contains(&name) {
            return Err(ExprError::UnknownFunction(name.to_string()));
        }
    }

    Ok(())
}

/// Truthiness: null, false, 0 and "" are false; everything else is true.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().unwrap_or(0.0) != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn as_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn numbers(value: Option<&Value>) -> Vec<f64> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(|v| as_f64(Some(v))).collect(),
        other => as_f64(other).into_iter().collect(),
    }
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn size(value: Option<&Value>) -> usize {
    match value {
        Some(Value::String(s)) => s.chars().count(),
        Some(Value::Array(a)) => a.len(),
        Some(Value::Object(o)) => o.len(),
        _ => 0,
    }
}

/// Build the evaluator with every allow-listed transform registered.
fn evaluator() -> jexl_eval::Evaluator<'static> {
    jexl_eval::Evaluator::new()
        // Strings
        .with_transform("lower", |args: &[Value]| Ok(json!(text(args.first()).to_lowercase())))
        .with_transform("upper", |args: &[Value]| Ok(json!(text(args.first()).to_uppercase())))
        .with_transform("trim", |args: &[Value]| Ok(json!(text(args.first()).trim())))
        .with_transform("contains", |args: &[Value]| {
            let found = match args.first() {
                Some(Value::Array(items)) => items.contains(args.get(1).unwrap_or(&Value::Null)),
                Some(Value::Object(map)) => map.contains_key(&text(args.get(1))),
                subject => text(subject).contains(&text(args.get(1))),
            };
            Ok(json!(found))
        })
        .with_transform("startsWith", |args: &[Value]| {
            Ok(json!(text(args.first()).starts_with(&text(args.get(1)))))
        })
        .with_transform("endsWith", |args: &[Value]| {
            Ok(json!(text(args.first()).ends_with(&text(args.get(1)))))
        })
        .with_transform("split", |args: &[Value]| {
            let subject = text(args.first());
            let delimiter = args.get(1).and_then(Value::as_str).unwrap_or(",");
            let parts: Vec<&str> = subject.split(delimiter).collect();
            Ok(json!(parts))
        })
        .with_transform("join", |args: &[Value]| {
            let separator = args.get(1).and_then(Value::as_str).unwrap_or(",");
            let joined = match args.first() {
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|v| text(Some(v)))
                    .collect::<Vec<_>>()
                    .join(separator),
                other => text(other),
            };
            Ok(json!(joined))
        })
        // Collections
        .with_transform("len", |args: &[Value]| Ok(json!(size(args.first()))))
        .with_transform("length", |args: &[Value]| Ok(json!(size(args.first()))))
        .with_transform("isEmpty", |args: &[Value]| {
            let empty = match args.first() {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.is_empty(),
                Some(Value::Array(a)) => a.is_empty(),
                Some(Value::Object(o)) => o.is_empty(),
                Some(_) => false,
            };
            Ok(json!(empty))
        })
        .with_transform("keys", |args: &[Value]| {
            let keys: Vec<String> = match args.first() {
                Some(Value::Object(map)) => map.keys().cloned().collect(),
                _ => Vec::new(),
            };
            Ok(json!(keys))
        })
        .with_transform("values", |args: &[Value]| {
            let values: Vec<Value> = match args.first() {
                Some(Value::Object(map)) => map.values().cloned().collect(),
                _ => Vec::new(),
            };
            Ok(Value::Array(values))
        })
        .with_transform("first", |args: &[Value]| {
            Ok(match args.first() {
                Some(Value::Array(items)) => items.first().cloned().unwrap_or(Value::Null),
                _ => Value::Null,
            })
        })
        .with_transform("last", |args: &[Value]| {
            Ok(match args.first() {
                Some(Value::Array(items)) => items.last().cloned().unwrap_or(Value::Null),
                _ => Value::Null,
            })
        })
        .with_transform("map", |args: &[Value]| {
            let field = text(args.get(1));
            Ok(match args.first() {
                Some(Value::Array(items)) => Value::Array(
                    items
                        .iter()
                        .map(|item| item.get(&field).cloned().unwrap_or(Value::Null))
                        .collect(),
                ),
                _ => Value::Array(Vec::new()),
            })
        })
        .with_transform("filter", |args: &[Value]| {
            let field = args.get(1).and_then(Value::as_str).map(str::to_string);
            Ok(match args.first() {
                Some(Value::Array(items)) => Value::Array(
                    items
                        .iter()
                        .filter(|item| match &field {
                            Some(f) => item.get(f).is_some_and(truthy),
                            None => truthy(item),
                        })
                        .cloned()
                        .collect(),
                ),
                _ => Value::Array(Vec::new()),
            })
        })
        // Numbers
        .with_transform("sum", |args: &[Value]| {
            Ok(json!(numbers(args.first()).iter().sum::<f64>()))
        })
        .with_transform("min", |args: &[Value]| {
            let mut all = numbers(args.first());
            all.extend(args.iter().skip(1).filter_map(|v| as_f64(Some(v))));
            Ok(all.into_iter().reduce(f64::min).map_or(Value::Null, |n| json!(n)))
        })
        .with_transform("max", |args: &[Value]| {
            let mut all = numbers(args.first());
            all.extend(args.iter().skip(1).filter_map(|v| as_f64(Some(v))));
            Ok(all.into_iter().reduce(f64::max).map_or(Value::Null, |n| json!(n)))
        })
        .with_transform("abs", |args: &[Value]| {
            Ok(as_f64(args.first()).map_or(Value::Null, |n| json!(n.abs())))
        })
        .with_transform("round", |args: &[Value]| {
            let places = as_f64(args.get(1)).unwrap_or(0.0).clamp(0.0, 12.0) as i32;
            let factor = 10f64.powi(places);
            Ok(as_f64(args.first()).map_or(Value::Null, |n| json!((n * factor).round() / factor)))
        })
        .with_transform("floor", |args: &[Value]| {
            Ok(as_f64(args.first()).map_or(Value::Null, |n| json!(n.floor())))
        })
        .with_transform("ceil", |args: &[Value]| {
            Ok(as_f64(args.first()).map_or(Value::Null, |n| json!(n.ceil())))
        })
        // Conversions
        .with_transform("number", |args: &[Value]| {
            Ok(as_f64(args.first()).map_or(Value::Null, |n| json!(n)))
        })
        .with_transform("string", |args: &[Value]| Ok(json!(text(args.first()))))
        .with_transform("bool", |args: &[Value]| {
            Ok(json!(args.first().is_some_and(truthy)))
        })
        .with_transform("not", |args: &[Value]| {
            Ok(json!(!args.first().is_some_and(truthy)))
        })
        .with_transform("default", |args: &[Value]| {
            Ok(match args.first() {
                None | Some(Value::Null) => args.get(1).cloned().unwrap_or(Value::Null),
                Some(value) => value.clone(),
            })
        })
        .with_transform("toJson", |args: &[Value]| {
            Ok(json!(args.first().unwrap_or(&Value::Null).to_string()))
        })
        .with_transform("fromJson", |args: &[Value]| {
            Ok(args
                .first()
                .and_then(Value::as_str)
                .and_then(|s| serde_json::from_str(s).ok())
                .unwrap_or(Value::Null))
        })
}

/// Largest magnitude below which every integer has an exact f64.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Numbers go in as floats so integer and float operands compare alike.
///
/// Integers too large for an exact f64 are left untouched, so ids pass
/// through unchanged; arithmetic on them is not exact.
fn to_floats(value: Value) -> Value {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.abs() <= MAX_EXACT_INTEGER => Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            _ => Value::Number(n),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(to_floats).collect()),
        Value::Object(map) => {
            Value::Object(map.into_iter().map(|(k, v)| (k, to_floats(v))).collect())
        }
        other => other,
    }
}

/// Integral floats come back out as integers.
fn to_integers(value: Value) -> Value {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => json!(f as i64),
            _ => Value::Number(n),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(to_integers).collect()),
        Value::Object(map) => {
            Value::Object(map.into_iter().map(|(k, v)| (k, to_integers(v))).collect())
        }
        other => other,
    }
}

/// Build the evaluation context for a scope.
///
/// Roots: `input` (or `bound_input` when given), `inputs` (always the run
/// input), `steps`, and any loop locals.
pub fn context(scope: &Scope<'_>, bound_input: Option<&Value>) -> Value {
    let mut ctx = Map::new();
    let run_input = Value::Object(scope.input().clone());
    ctx.insert(
        "input".to_string(),
        bound_input.cloned().unwrap_or_else(|| run_input.clone()),
    );
    ctx.insert("inputs".to_string(), run_input);
    ctx.insert("steps".to_string(), Value::Object(scope.steps().clone()));
    for (name, value) in scope.locals() {
        ctx.entry(name.clone()).or_insert_with(|| value.clone());
    }
    Value::Object(ctx)
}

/// Evaluate an expression against a JSON object context.
pub fn evaluate(expression: &str, context: &Value) -> Result<Value, ExprError> {
    check(expression)?;
    let context = to_floats(context.clone());
    evaluator()
        .eval_in_context(expression, &context)
        .map(to_integers)
        .map_err(|e| ExprError::EvalFailed(e.to_string()))
}

/// Evaluate and coerce the result with [`truthy`].
pub fn evaluate_bool(expression: &str, context: &Value) -> Result<bool, ExprError> {
    evaluate(expression, context).map(|v| truthy(&v))
}
