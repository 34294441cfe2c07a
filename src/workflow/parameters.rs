//! Run input resolution.
//!
//! Caller-supplied input is checked against the definition's declared
//! inputs before any step runs. Every problem is reported at once.

use serde_json::{Map, Value};

use super::types::{InputType, WorkflowDefinition, WorkflowInput};
use crate::error::{Error, Result};

/// Check run input against the declared inputs and fill defaults.
///
/// - A required input that is absent (or null) is an error.
/// - An optional input that is absent takes its default, or stays absent.
/// - A present value must match the declared type.
/// - Fields that are not declared pass through untouched.
pub fn resolve_inputs(workflow: &WorkflowDefinition, input: &Value) -> Result<Map<String, Value>> {
    let provided = match input {
        Value::Object(obj) => obj.clone(),
        Value::Null => Map::new(),
        other => {
            return Err(Error::Input(format!(
                "Run input must be an object, got {}",
                json_type_name(other)
            )))
        }
    };

    let mut resolved = Map::new();
    let mut errors = Vec::new();

    for declared in &workflow.inputs {
        match resolve_one(declared, provided.get(&declared.name)) {
            Ok(Some(value)) => {
                resolved.insert(declared.name.clone(), value);
            }
            Ok(None) => {}
            Err(message) => errors.push(message),
        }
    }

    if !errors.is_empty() {
        return Err(Error::Input(format!(
            "Input validation failed:\n  - {}",
            errors.join("\n  - ")
        )));
    }

    for (key, value) in provided {
        if !resolved.contains_key(&key) {
            resolved.insert(key, value);
        }
    }

    Ok(resolved)
}

fn resolve_one(
    declared: &WorkflowInput,
    value: Option<&Value>,
) -> std::result::Result<Option<Value>, String> {
    match value {
        None | Some(Value::Null) => {
            if let Some(default) = &declared.default {
                return Ok(Some(default.clone()));
            }
            if declared.required {
                return Err(format!("Missing required input: {}", declared.name));
            }
            Ok(None)
        }
        Some(v) => {
            check_type(&declared.name, declared.input_type, v)?;
            Ok(Some(v.clone()))
        }
    }
}

fn check_type(name: &str, expected: InputType, value: &Value) -> std::result::Result<(), String> {
    if expected.accepts(value) {
        Ok(())
    } else {
        Err(format!(
            "Input '{}' expected type '{}', got '{}'",
            name,
            expected.as_str(),
            json_type_name(value)
        ))
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Parse CLI parameter strings into a JSON object.
///
/// Accepts parameters in format: key=value
/// Values are parsed as JSON if valid, otherwise treated as strings.
pub fn parse_cli_params(params: &[String]) -> Result<Value> {
    let mut result = Map::new();

    for param in params {
        let (key, raw) = param.split_once('=').ok_or_else(|| {
            Error::Input(format!("Invalid parameter '{}': expected key=value", param))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::Input(format!(
                "Invalid parameter '{}': empty key",
                param
            )));
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        result.insert(key.to_string(), value);
    }

    Ok(Value::Object(result))
}

/// Merge CLI parameters over a base input object.
pub fn merge_params(base: &Value, params: &Value) -> Value {
    match (base, params) {
        (Value::Object(base_obj), Value::Object(params_obj)) => {
            let mut merged = base_obj.clone();
            for (key, value) in params_obj {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        (_, Value::Object(params_obj)) if !params_obj.is_empty() => params.clone(),
        (base, _) => base.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::parse_workflow;
    use serde_json::json;

    fn workflow() -> WorkflowDefinition {
        parse_workflow(
            r#"
name: inputs
creator:
  address: "0xabc"
pricing:
  basePrice: 0
inputs:
  - name: city
    type: string
  - name: days
    type: number
    default: 3
  - name: verbose
    type: boolean
    required: false
steps:
  - id: t
    type: transform
    expression: "input.city"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults_and_passthrough() {
        let resolved = resolve_inputs(&workflow(), &json!({"city": "Oslo", "extra": 1})).unwrap();
        assert_eq!(resolved["city"], "Oslo");
        assert_eq!(resolved["days"], 3);
        assert_eq!(resolved["extra"], 1);
        assert!(!resolved.contains_key("verbose"));
    }

    #[test]
    fn test_missing_required_input() {
        let err = resolve_inputs(&workflow(), &json!({})).unwrap_err();
        assert_eq!(err.code(), "INPUT_ERROR");
        assert!(err.to_string().contains("Missing required input: city"));
    }

    #[test]
    fn test_errors_are_aggregated() {
        let err = resolve_inputs(&workflow(), &json!({"days": "three", "verbose": 1})).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("Missing required input: city"));
        assert!(text.contains("Input 'days' expected type 'number', got 'string'"));
        assert!(text.contains("Input 'verbose' expected type 'boolean'"));
    }

    #[test]
    fn test_non_object_input() {
        let err = resolve_inputs(&workflow(), &json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("must be an object"));
    }

    #[test]
    fn test_parse_cli_params() {
        let params = vec![
            "city=Oslo".to_string(),
            "days=5".to_string(),
            "tags=[\"a\"]".to_string(),
        ];
        let value = parse_cli_params(&params).unwrap();
        assert_eq!(value, json!({"city": "Oslo", "days": 5, "tags": ["a"]}));

        assert!(parse_cli_params(&["novalue".to_string()]).is_err());
    }

    #[test]
    fn test_merge_params() {
        let merged = merge_params(&json!({"a": 1, "b": 2}), &json!({"b": 3}));
        assert_eq!(merged, json!({"a": 1, "b": 3}));
        assert_eq!(merge_params(&Value::Null, &json!({})), Value::Null);
    }
}
