//! flowtoll - declarative pay-per-execution workflow engine
//!
//! A workflow is a YAML or JSON document listing steps (remote tool calls,
//! AI decisions, local transforms, conditions, loops) and how they depend on
//! each other. flowtoll validates the document, orders the steps, runs them
//! with per-step retry and error policies, and prices the run: the charge is
//! never below the advertised base price and is split between the workflow's
//! creator and the platform.
//!
//! ## Example
//!
//! ```yaml
//! name: lead-digest
//! creator:
//!   address: "0x1234"
//!   revenueShare: 70
//! pricing:
//!   basePrice: 0.05
//! inputs:
//!   - name: query
//!     type: string
//! steps:
//!   - id: search
//!     type: tool_call
//!     server: lead-search
//!     function: search_leads
//!     params:
//!       query: "{{input.query}}"
//!   - id: names
//!     type: transform
//!     input: "{{steps.search.results}}"
//!     expression: "input|map('name')|join(', ')"
//!     dependsOn: [search]
//! output: "{{steps.names}}"
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod expr;
pub mod metrics;
pub mod steps;
pub mod telemetry;
pub mod template;
pub mod workflow;

pub use engine::{ExecutionResult, Executor};
pub use error::{Error, Result};
pub use workflow::{parse_workflow, WorkflowDefinition};
