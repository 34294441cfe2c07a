//! Workflow validation.
//!
//! Two passes, both aggregating every violation they find:
//! - [`validate_document`] checks the raw document for required fields,
//!   per-variant step fields, and field types before deserialization.
//! - [`validate_workflow`] checks the typed definition: unique ids, value
//!   ranges, references, step ownership, and dependency cycles.
//!
//! When the document cannot be read into the typed model at all,
//! `document_graph_violations` still reports dangling references and
//! cycles from the raw tree.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use serde_json::Value;

use super::dag::DependencyGraph;
use super::types::{Creator, Pricing, StepKind, WorkflowDefinition, WorkflowInput, WorkflowStep};
use crate::error::{Result, ValidationError, Violation, ViolationKind};

const RESERVED_BINDINGS: &[&str] = &["input", "inputs", "steps", "index"];

const STEP_TYPES: &[&str] = &["tool_call", "ai_decision", "transform", "condition", "loop"];

/// Check required fields on the raw document tree.
pub fn validate_document(document: &Value) -> std::result::Result<(), ValidationError> {
    ValidationError::check(document_violations(document))
}

pub(crate) fn document_violations(document: &Value) -> Vec<Violation> {
    let mut violations = Vec::new();

    if !has_string(document, &["name"]) {
        violations.push(Violation::missing("name"));
    }
    if has_string(document, &["creator", "address"]) {
        if let Some(creator) = document.get("creator") {
            check_typed::<Creator>(creator, "creator", &mut violations);
        }
    } else {
        violations.push(Violation::missing("creator.address"));
    }
    match lookup_any(document, &[&["pricing", "basePrice"], &["pricing", "base_price"]]) {
        None | Some(Value::Null) => violations.push(Violation::missing("pricing.basePrice")),
        Some(v) if !v.is_number() => {
            violations.push(Violation::invalid("pricing.basePrice must be a number"))
        }
        Some(_) => {
            if let Some(pricing) = document.get("pricing") {
                check_typed::<Pricing>(pricing, "pricing", &mut violations);
            }
        }
    }

    match document.get("inputs") {
        None | Some(Value::Null) => {}
        Some(Value::Array(inputs)) => {
            for (index, input) in inputs.iter().enumerate() {
                check_typed::<WorkflowInput>(input, &format!("inputs[{}]", index), &mut violations);
            }
        }
        Some(_) => violations.push(Violation::invalid("inputs must be an array")),
    }

    match document.get("steps") {
        None | Some(Value::Null) => violations.push(Violation::missing("steps")),
        Some(Value::Array(steps)) => {
            for (index, step) in steps.iter().enumerate() {
                check_step_document(index, step, &mut violations);
            }
        }
        Some(_) => violations.push(Violation::invalid("steps must be an array")),
    }

    violations
}

/// Report a section whose field values do not fit the typed model.
fn check_typed<'de, T: Deserialize<'de>>(
    value: &'de Value,
    label: &str,
    violations: &mut Vec<Violation>,
) {
    if let Err(e) = T::deserialize(value) {
        violations.push(Violation::invalid(format!("{} is invalid: {}", label, e)));
    }
}

fn check_step_document(index: usize, step: &Value, violations: &mut Vec<Violation>) {
    let before = violations.len();
    check_step_fields(index, step, violations);
    if violations.len() == before {
        let label = match step.get("id").and_then(Value::as_str) {
            Some(id) => format!("Step '{}'", id),
            None => format!("steps[{}]", index),
        };
        check_typed::<WorkflowStep>(step, &label, violations);
    }
}

fn check_step_fields(index: usize, step: &Value, violations: &mut Vec<Violation>) {
    if !step.is_object() {
        violations.push(Violation::invalid(format!(
            "steps[{}] must be a mapping",
            index
        )));
        return;
    }

    let label = match step.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => format!("Step '{}'", id),
        _ => {
            violations.push(Violation::missing(&format!("steps[{}].id", index)));
            format!("steps[{}]", index)
        }
    };

    let Some(step_type) = step.get("type").and_then(Value::as_str) else {
        violations.push(Violation::missing(&format!("steps[{}].type", index)));
        return;
    };

    let required: &[&str] = match step_type {
        "tool_call" => &["server", "function"],
        "ai_decision" => &["prompt"],
        "transform" => &["expression"],
        "condition" => &["expression"],
        "loop" => &["over"],
        other => {
            violations.push(Violation::new(
                ViolationKind::UnknownStepType,
                format!(
                    "{} has unknown type '{}' (expected one of: {})",
                    label,
                    other,
                    STEP_TYPES.join(", ")
                ),
            ));
            return;
        }
    };

    for field in required {
        let present = match step.get(*field) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => *field == "over",
        };
        if !present {
            violations.push(Violation::new(
                ViolationKind::MissingField,
                format!(
                    "{} ({}) is missing required field: {}",
                    label, step_type, field
                ),
            ));
        }
    }

    let list_field = match step_type {
        "condition" => Some("then"),
        "loop" => Some("steps"),
        _ => None,
    };
    if let Some(field) = list_field {
        let non_empty = step
            .get(field)
            .and_then(Value::as_array)
            .is_some_and(|items| !items.is_empty());
        if !non_empty {
            violations.push(Violation::new(
                ViolationKind::MissingField,
                format!("{} ({}) requires a non-empty '{}' list", label, step_type, field),
            ));
        }
    }
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(key))
}

fn lookup_any<'a>(value: &'a Value, paths: &[&[&str]]) -> Option<&'a Value> {
    paths.iter().find_map(|path| lookup(value, path))
}

fn has_string(value: &Value, path: &[&str]) -> bool {
    lookup(value, path)
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty())
}

/// Reference and cycle checks on the raw document tree, for definitions
/// that could not be read into the typed model.
pub(crate) fn document_graph_violations(document: &Value) -> Vec<Violation> {
    let mut violations = Vec::new();
    let Some(steps) = document.get("steps").and_then(Value::as_array) else {
        return violations;
    };

    let mut ids = HashSet::new();
    let mut entries: Vec<(&str, &Value)> = Vec::new();
    for step in steps {
        let Some(id) = step
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.trim().is_empty())
        else {
            continue;
        };
        if !ids.insert(id) {
            violations.push(Violation::new(
                ViolationKind::DuplicateStepId,
                format!("Duplicate step ID: {}", id),
            ));
        }
        entries.push((id, step));
    }

    for &(id, step) in &entries {
        for dep in string_list(step, &["dependsOn", "depends_on"]) {
            if !ids.contains(dep) {
                violations.push(Violation::new(
                    ViolationKind::UnknownDependency,
                    format!("Step '{}' depends on unknown step '{}'", id, dep),
                ));
            }
        }

        let (label, fields): (&str, &[&str]) = match step.get("type").and_then(Value::as_str) {
            Some("condition") => ("Condition", &["then", "else"][..]),
            Some("loop") => ("Loop", &["steps"][..]),
            _ => continue,
        };
        for field in fields {
            for child in string_list(step, &[*field]) {
                if !ids.contains(child) {
                    violations.push(Violation::new(
                        ViolationKind::UnknownBranchStep,
                        format!("{} step '{}' references unknown step '{}'", label, id, child),
                    ));
                }
            }
        }
    }

    let graph = DependencyGraph::from_edges(
        entries
            .iter()
            .map(|&(id, step)| (id, string_list(step, &["dependsOn", "depends_on"]))),
    );
    if let Some(path) = graph.find_cycle() {
        violations.push(cycle_violation("Dependency cycle detected", path));
    }

    violations
}

/// String items of the first present list field.
fn string_list<'a>(step: &'a Value, keys: &[&str]) -> Vec<&'a str> {
    keys.iter()
        .find_map(|key| step.get(*key))
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

/// Validate a typed workflow definition.
///
/// Checks for:
/// - Name and version format
/// - Revenue share in [0, 100], non-negative prices and costs
/// - Unique input names and step IDs
/// - Valid dependencies and branch/loop references
/// - Each step owned by at most one control step
/// - No circular dependencies, including through control steps
pub fn validate_workflow(workflow: &WorkflowDefinition) -> Result<()> {
    ValidationError::check(workflow_violations(workflow))?;
    Ok(())
}

pub(crate) fn workflow_violations(workflow: &WorkflowDefinition) -> Vec<Violation> {
    let mut violations = Vec::new();

    check_metadata(workflow, &mut violations);
    check_inputs(workflow, &mut violations);

    let ids = check_step_ids(workflow, &mut violations);
    check_loop_bindings(workflow, &mut violations);
    let references_ok = check_references(workflow, &ids, &mut violations);
    let ownership_ok = check_ownership(workflow, &mut violations);

    if let Some(path) = DependencyGraph::from_steps(&workflow.steps).find_cycle() {
        violations.push(cycle_violation("Dependency cycle detected", path));
    } else if references_ok && ownership_ok {
        check_bodies(workflow, &mut violations);
        if let Some(path) = DependencyGraph::collapsed(workflow).find_cycle() {
            violations.push(cycle_violation(
                "Dependency cycle detected through control steps",
                path,
            ));
        }
    }

    violations
}

fn cycle_violation(prefix: &str, path: Vec<String>) -> Violation {
    let message = format!("{}: {}", prefix, path.join(" -> "));
    Violation::new(ViolationKind::Cycle { path }, message)
}

fn check_metadata(workflow: &WorkflowDefinition, violations: &mut Vec<Violation>) {
    if workflow.name.trim().is_empty() {
        violations.push(Violation::missing("name"));
    } else if !workflow
        .name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        violations.push(Violation::invalid(
            "Workflow name must contain only alphanumeric characters, hyphens, and underscores",
        ));
    }

    if !is_semver(&workflow.version) {
        violations.push(Violation::invalid(format!(
            "Version '{}' is not a semantic version (MAJOR.MINOR.PATCH)",
            workflow.version
        )));
    }

    if workflow.creator.address.trim().is_empty() {
        violations.push(Violation::missing("creator.address"));
    }

    let share = workflow.creator.revenue_share;
    if !share.is_finite() || !(0.0..=100.0).contains(&share) {
        violations.push(Violation::invalid(format!(
            "creator.revenueShare must be between 0 and 100, got {}",
            share
        )));
    }

    let price = workflow.pricing.base_price;
    if !price.is_finite() || price < 0.0 {
        violations.push(Violation::invalid(format!(
            "pricing.basePrice must be a non-negative number, got {}",
            price
        )));
    }

    if workflow.pricing.currency.trim().is_empty() {
        violations.push(Violation::invalid("pricing.currency cannot be empty"));
    }

    if workflow.steps.is_empty() {
        violations.push(Violation::invalid("Workflow must have at least one step"));
    }
}

fn is_semver(version: &str) -> bool {
    let core = version.split(['-', '+']).next().unwrap_or("");
    let parts: Vec<&str> = core.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

fn check_inputs(workflow: &WorkflowDefinition, violations: &mut Vec<Violation>) {
    let mut names = HashSet::new();
    for input in &workflow.inputs {
        if input.name.trim().is_empty() {
            violations.push(Violation::missing("inputs[].name"));
            continue;
        }
        if !names.insert(input.name.as_str()) {
            violations.push(Violation::new(
                ViolationKind::DuplicateInput,
                format!("Duplicate input name: {}", input.name),
            ));
        }
        if let Some(default) = &input.default {
            if !default.is_null() && !input.input_type.accepts(default) {
                violations.push(Violation::invalid(format!(
                    "Input '{}' default does not match declared type '{}'",
                    input.name,
                    input.input_type.as_str()
                )));
            }
        }
    }
}

fn check_step_ids<'a>(
    workflow: &'a WorkflowDefinition,
    violations: &mut Vec<Violation>,
) -> HashSet<&'a str> {
    let mut ids = HashSet::new();
    for step in &workflow.steps {
        if step.id.trim().is_empty() {
            violations.push(Violation::missing("steps[].id"));
            continue;
        }
        if !ids.insert(step.id.as_str()) {
            violations.push(Violation::new(
                ViolationKind::DuplicateStepId,
                format!("Duplicate step ID: {}", step.id),
            ));
        }
        if let Some(cost) = step.estimated_cost {
            if !cost.is_finite() || cost < 0.0 {
                violations.push(Violation::invalid(format!(
                    "Step '{}' has a negative or invalid estimatedCost",
                    step.id
                )));
            }
        }
    }
    ids
}

/// Loop bindings must be plain identifiers that do not hide the built-in
/// roots, or templates and expressions could never reach them.
fn check_loop_bindings(workflow: &WorkflowDefinition, violations: &mut Vec<Violation>) {
    for step in &workflow.steps {
        if let StepKind::Loop(each) = &step.kind {
            let name = each.item_var.as_str();
            if !is_identifier(name) || RESERVED_BINDINGS.contains(&name) {
                violations.push(Violation::invalid(format!(
                    "Loop '{}' cannot bind its item as '{}'",
                    step.id, name
                )));
            }
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Returns false when any reference is dangling.
fn check_references(
    workflow: &WorkflowDefinition,
    ids: &HashSet<&str>,
    violations: &mut Vec<Violation>,
) -> bool {
    let before = violations.len();

    for step in &workflow.steps {
        for dep in &step.depends_on {
            if !ids.contains(dep.as_str()) {
                violations.push(Violation::new(
                    ViolationKind::UnknownDependency,
                    format!("Step '{}' depends on unknown step '{}'", step.id, dep),
                ));
            }
        }

        for child in step.kind.owned_steps() {
            if !ids.contains(child) {
                violations.push(Violation::new(
                    ViolationKind::UnknownBranchStep,
                    format!(
                        "{} step '{}' references unknown step '{}'",
                        kind_label(&step.kind),
                        step.id,
                        child
                    ),
                ));
            }
        }
    }

    violations.len() == before
}

fn kind_label(kind: &StepKind) -> &'static str {
    match kind {
        StepKind::Condition(_) => "Condition",
        StepKind::Loop(_) => "Loop",
        StepKind::ToolCall(_) => "Tool call",
        StepKind::AiDecision(_) => "AI decision",
        StepKind::Transform(_) => "Transform",
    }
}

/// Returns false when ownership is ambiguous or circular.
fn check_ownership(workflow: &WorkflowDefinition, violations: &mut Vec<Violation>) -> bool {
    let before = violations.len();
    let mut owners: HashMap<&str, &str> = HashMap::new();

    for step in &workflow.steps {
        let mut seen_here = HashSet::new();
        for child in step.kind.owned_steps() {
            if child == step.id {
                violations.push(Violation::new(
                    ViolationKind::OwnershipConflict,
                    format!("Step '{}' cannot run itself as a branch or loop body", step.id),
                ));
                continue;
            }
            if !seen_here.insert(child) {
                violations.push(Violation::new(
                    ViolationKind::OwnershipConflict,
                    format!("Step '{}' lists '{}' more than once", step.id, child),
                ));
                continue;
            }
            if let Some(previous) = owners.insert(child, step.id.as_str()) {
                violations.push(Violation::new(
                    ViolationKind::OwnershipConflict,
                    format!(
                        "Step '{}' is run by both '{}' and '{}'",
                        child, previous, step.id
                    ),
                ));
            }
        }
    }

    for start in owners.keys() {
        let mut current = *start;
        let mut hops = 0;
        while let Some(owner) = owners.get(current) {
            if owner == start {
                violations.push(Violation::new(
                    ViolationKind::OwnershipConflict,
                    format!("Step '{}' is nested inside itself", start),
                ));
                break;
            }
            current = *owner;
            hops += 1;
            if hops > owners.len() {
                break;
            }
        }
    }

    violations.len() == before
}

/// A body step may depend on an earlier step of the same body or on a step
/// outside its owner; anything else would not have run yet.
fn check_bodies(workflow: &WorkflowDefinition, violations: &mut Vec<Violation>) {
    let owners = workflow.owners();

    let inside = |candidate: &str, owner: &str| -> bool {
        let mut current = candidate;
        if current == owner {
            return true;
        }
        for _ in 0..=owners.len() {
            match owners.get(current) {
                Some(parent) if *parent == owner => return true,
                Some(parent) => current = *parent,
                None => return false,
            }
        }
        false
    };

    for step in &workflow.steps {
        for body in step.kind.bodies() {
            for (position, member) in body.iter().enumerate() {
                let Some(member_step) = workflow.get_step(member) else {
                    continue;
                };
                for dep in &member_step.depends_on {
                    let earlier = body[..position].iter().any(|b| b == dep);
                    if !earlier && inside(dep.as_str(), step.id.as_str()) {
                        violations.push(Violation::invalid(format!(
                            "Step '{}' in '{}' depends on '{}', which does not run before it",
                            member, step.id, dep
                        )));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::workflow::parse_workflow;

    fn header() -> &'static str {
        r#"
name: test
creator:
  address: "0xabc"
pricing:
  basePrice: 0.05
"#
    }

    fn violations(yaml: &str) -> ValidationError {
        match parse_workflow(yaml).unwrap_err() {
            Error::Validation(v) => v,
            other => panic!("Expected validation error, got {}", other),
        }
    }

    #[test]
    fn test_validate_valid_workflow() {
        let yaml = format!(
            "{}{}",
            header(),
            r#"
steps:
  - id: a
    type: transform
    expression: "1"
  - id: b
    type: transform
    expression: "2"
    dependsOn: [a]
"#
        );
        assert!(parse_workflow(&yaml).is_ok());
    }

    #[test]
    fn test_validate_unknown_dependency() {
        let yaml = format!(
            "{}{}",
            header(),
            r#"
steps:
  - id: a
    type: transform
    expression: "1"
    dependsOn: ["X"]
"#
        );
        let err = violations(&yaml);
        assert!(err.has_kind(&ViolationKind::UnknownDependency));
        assert!(err.to_string().contains("depends on unknown step 'X'"));
    }

    #[test]
    fn test_validate_cycle_names_members() {
        let yaml = format!(
            "{}{}",
            header(),
            r#"
steps:
  - id: A
    type: transform
    expression: "1"
    dependsOn: [B]
  - id: B
    type: transform
    expression: "2"
    dependsOn: [A]
"#
        );
        let err = violations(&yaml);
        let path = err.cycle().unwrap();
        assert_eq!(path, ["A", "B", "A"]);
        assert!(err.to_string().contains("A -> B -> A"));
    }

    #[test]
    fn test_validate_aggregates_violations() {
        let yaml = r#"
name: "bad name!"
version: "one"
creator:
  address: "0xabc"
  revenueShare: 140
pricing:
  basePrice: -1
steps:
  - id: a
    type: transform
    expression: "1"
  - id: a
    type: transform
    expression: "2"
"#;
        let err = violations(yaml);
        assert!(err.violations.len() >= 5);
        assert!(err.has_kind(&ViolationKind::DuplicateStepId));
        let text = err.to_string();
        assert!(text.contains("revenueShare"));
        assert!(text.contains("basePrice"));
        assert!(text.contains("semantic version"));
        assert!(text.contains("alphanumeric"));
    }

    #[test]
    fn test_validate_unknown_step_type() {
        let yaml = format!(
            "{}{}",
            header(),
            r#"
steps:
  - id: a
    type: teleport
"#
        );
        let err = violations(&yaml);
        assert!(err.has_kind(&ViolationKind::UnknownStepType));
    }

    #[test]
    fn test_condition_requires_then() {
        let yaml = format!(
            "{}{}",
            header(),
            r#"
steps:
  - id: gate
    type: condition
    expression: "true"
    then: []
"#
        );
        let err = violations(&yaml);
        assert!(err.to_string().contains("non-empty 'then'"));
    }

    #[test]
    fn test_branch_reference_must_exist() {
        let yaml = format!(
            "{}{}",
            header(),
            r#"
steps:
  - id: gate
    type: condition
    expression: "true"
    then: [ghost]
"#
        );
        let err = violations(&yaml);
        assert!(err.has_kind(&ViolationKind::UnknownBranchStep));
    }

    #[test]
    fn test_step_owned_twice() {
        let yaml = format!(
            "{}{}",
            header(),
            r#"
steps:
  - id: first
    type: condition
    expression: "true"
    then: [work]
  - id: second
    type: loop
    over: "{{input.items}}"
    steps: [work]
  - id: work
    type: transform
    expression: "1"
"#
        );
        let err = violations(&yaml);
        assert!(err.has_kind(&ViolationKind::OwnershipConflict));
    }

    #[test]
    fn test_nested_inside_itself() {
        let yaml = format!(
            "{}{}",
            header(),
            r#"
steps:
  - id: outer
    type: condition
    expression: "true"
    then: [inner]
  - id: inner
    type: loop
    over: "{{input.items}}"
    steps: [outer]
"#
        );
        let err = violations(&yaml);
        assert!(err.to_string().contains("nested inside itself"));
    }

    #[test]
    fn test_body_step_cannot_depend_on_later_sibling() {
        let yaml = format!(
            "{}{}",
            header(),
            r#"
steps:
  - id: each
    type: loop
    over: "{{input.items}}"
    steps: [first, second]
  - id: first
    type: transform
    expression: "1"
    dependsOn: [second]
  - id: second
    type: transform
    expression: "2"
"#
        );
        let err = violations(&yaml);
        assert!(err.to_string().contains("does not run before it"));
    }

    #[test]
    fn test_cycle_through_control_step() {
        let yaml = format!(
            "{}{}",
            header(),
            r#"
steps:
  - id: top
    type: transform
    expression: "1"
    dependsOn: [gate]
  - id: gate
    type: condition
    expression: "true"
    then: [inner]
  - id: inner
    type: transform
    expression: "2"
    dependsOn: [top]
"#
        );
        let err = violations(&yaml);
        let path = err.cycle().unwrap();
        assert_eq!(path, ["top", "gate", "top"]);
        assert!(err.to_string().contains("through control steps"));
    }

    #[test]
    fn test_input_default_type_mismatch() {
        let yaml = format!(
            "{}{}",
            header(),
            r#"
inputs:
  - name: limit
    type: number
    default: "ten"
  - name: limit
    type: number
steps:
  - id: a
    type: transform
    expression: "1"
"#
        );
        let err = violations(&yaml);
        assert!(err.has_kind(&ViolationKind::DuplicateInput));
        assert!(err.to_string().contains("does not match declared type"));
    }

    #[test]
    fn test_loop_item_cannot_shadow_roots() {
        let yaml = format!(
            "{}{}",
            header(),
            r#"
steps:
  - id: each
    type: loop
    over: [1, 2]
    as: steps
    steps: [noop]
  - id: noop
    type: transform
    expression: "1"
"#
        );
        let err = violations(&yaml);
        assert!(err.to_string().contains("cannot bind its item as 'steps'"));
    }

    #[test]
    fn test_loop_item_must_be_identifier() {
        let yaml = format!(
            "{}{}",
            header(),
            r#"
steps:
  - id: each
    type: loop
    over: [1, 2]
    as: my-city
    steps: [noop]
  - id: noop
    type: transform
    expression: "1"
"#
        );
        let err = violations(&yaml);
        assert!(err.to_string().contains("cannot bind its item as 'my-city'"));

        assert!(is_identifier("city_2"));
        assert!(is_identifier("_row"));
        assert!(!is_identifier("2nd"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_negative_estimated_cost_rejected() {
        let yaml = format!(
            "{}{}",
            header(),
            r#"
steps:
  - id: lookup
    type: tool_call
    server: crm
    function: find
    estimatedCost: -0.01
"#
        );
        let err = violations(&yaml);
        assert_eq!(err.violations.len(), 1);
        assert!(err
            .to_string()
            .contains("Step 'lookup' has a negative or invalid estimatedCost"));
    }

    #[test]
    fn test_is_semver() {
        assert!(is_semver("1.0.0"));
        assert!(is_semver("2.10.3-beta.1"));
        assert!(!is_semver("1.0"));
        assert!(!is_semver("v1.0.0"));
    }
}
