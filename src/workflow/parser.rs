//! Workflow definition parser.
//!
//! Definitions come in two interchangeable syntaxes: a YAML document or a
//! plain JSON object. Both are read into the same document tree, checked,
//! defaulted, and deserialized into [`WorkflowDefinition`].

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use super::types::WorkflowDefinition;
use super::validator::{document_graph_violations, document_violations, workflow_violations};
use crate::error::{Error, Result, ValidationError, Violation};

/// Concrete syntax of a serialized definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionFormat {
    Yaml,
    Json,
}

impl DefinitionFormat {
    /// JSON when the text starts with `{`, YAML otherwise.
    pub fn detect(text: &str) -> Self {
        if text.trim_start().starts_with('{') {
            DefinitionFormat::Json
        } else {
            DefinitionFormat::Yaml
        }
    }

    /// Pick a format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(DefinitionFormat::Json),
            "yaml" | "yml" => Some(DefinitionFormat::Yaml),
            _ => None,
        }
    }
}

impl std::str::FromStr for DefinitionFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(DefinitionFormat::Yaml),
            "json" => Ok(DefinitionFormat::Json),
            other => Err(format!("Unknown definition format: {}", other)),
        }
    }
}

/// Parse a workflow definition, detecting the syntax.
pub fn parse_workflow(text: &str) -> Result<WorkflowDefinition> {
    parse_workflow_as(text, DefinitionFormat::detect(text))
}

/// Parse a workflow definition written in a known syntax.
///
/// Every stage runs even after an earlier one finds problems, so a single
/// [`Error::Validation`] lists all of them.
pub fn parse_workflow_as(text: &str, format: DefinitionFormat) -> Result<WorkflowDefinition> {
    let mut document = parse_document(text, format)?;

    let mut violations = document_violations(&document);
    apply_defaults(&mut document);

    match WorkflowDefinition::deserialize(&document) {
        Ok(workflow) => {
            violations.extend(workflow_violations(&workflow));
            if violations.is_empty() {
                return Ok(workflow);
            }
        }
        Err(e) => {
            if violations.is_empty() {
                violations.push(Violation::invalid(format!("Invalid definition: {}", e)));
            }
            violations.extend(document_graph_violations(&document));
        }
    }

    Err(ValidationError::new(dedup(violations)).into())
}

/// Drop repeats reported by more than one stage, keeping the first.
fn dedup(violations: Vec<Violation>) -> Vec<Violation> {
    let mut unique: Vec<Violation> = Vec::with_capacity(violations.len());
    for violation in violations {
        if !unique.iter().any(|v| v.message == violation.message) {
            unique.push(violation);
        }
    }
    unique
}

/// Parse a workflow from a file path.
pub fn parse_workflow_file(path: &Path) -> Result<WorkflowDefinition> {
    let content = std::fs::read_to_string(path)?;
    let format = DefinitionFormat::from_path(path).unwrap_or_else(|| DefinitionFormat::detect(&content));
    parse_workflow_as(&content, format)
}

/// Read definition text into a generic document tree.
pub fn parse_document(text: &str, format: DefinitionFormat) -> Result<Value> {
    if text.trim().is_empty() {
        return Err(Error::Parse("Empty workflow definition".to_string()));
    }

    let document = match format {
        DefinitionFormat::Yaml => serde_yaml::from_str::<Value>(text)
            .map_err(|e| Error::Parse(format!("Invalid YAML: {}", e)))?,
        DefinitionFormat::Json => serde_json::from_str::<Value>(text)
            .map_err(|e| Error::Parse(format!("Invalid JSON: {}", e)))?,
    };

    if !document.is_object() {
        return Err(Error::Parse(
            "Workflow definition must be a mapping at the top level".to_string(),
        ));
    }

    Ok(document)
}

/// Fill defaults that depend on other fields of the same entry.
///
/// Static defaults (currency, revenue share, error policy, retry count) are
/// applied by serde during deserialization.
fn apply_defaults(document: &mut Value) {
    if let Some(inputs) = document.get_mut("inputs").and_then(Value::as_array_mut) {
        for input in inputs.iter_mut().filter_map(Value::as_object_mut) {
            if !input.contains_key("required") {
                let has_default = input.get("default").is_some_and(|d| !d.is_null());
                input.insert("required".to_string(), Value::Bool(!has_default));
            }
        }
    }
}

/// Serialize a definition as YAML.
pub fn to_yaml(workflow: &WorkflowDefinition) -> Result<String> {
    Ok(serde_yaml::to_string(workflow)?)
}

/// Serialize a definition as pretty JSON.
pub fn to_json(workflow: &WorkflowDefinition) -> Result<String> {
    Ok(serde_json::to_string_pretty(workflow)?)
}

/// Serialize a definition in the requested syntax.
pub fn serialize_workflow(workflow: &WorkflowDefinition, format: DefinitionFormat) -> Result<String> {
    match format {
        DefinitionFormat::Yaml => to_yaml(workflow),
        DefinitionFormat::Json => to_json(workflow),
    }
}
