//! Workflow definition, parsing, and validation.
//!
//! A workflow definition consists of:
//! - Metadata: name, version, creator payout share, pricing
//! - Inputs: typed parameters supplied per run
//! - Steps: tool calls, AI decisions, transforms, conditions and loops
//! - Output: how the final result is shaped

mod dag;
mod parameters;
mod parser;
mod store;
mod types;
mod validator;

pub use dag::{execution_order, find_cycle, render_plan, DependencyGraph, ExecutionPlan};
pub use parameters::{merge_params, parse_cli_params, resolve_inputs};
pub(crate) use parameters::json_type_name;
pub use parser::{
    parse_document, parse_workflow, parse_workflow_as, parse_workflow_file, serialize_workflow,
    to_json, to_yaml, DefinitionFormat,
};
pub use store::{InMemoryWorkflowStore, WorkflowStore, WorkflowSummary};
pub use types::*;
pub use validator::{validate_document, validate_workflow};
