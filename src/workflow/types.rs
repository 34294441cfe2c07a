//! Workflow definition model.
//!
//! These types are the validated, defaulted shape of a definition. They are
//! produced by [`parse_workflow`](super::parse_workflow) and are never
//! mutated by the engine.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Share of each run paid to the creator when the definition does not say.
pub const DEFAULT_REVENUE_SHARE: f64 = 70.0;

/// Currency tag applied when pricing omits one.
pub const DEFAULT_CURRENCY: &str = "USDC";

/// Semantic version applied when the definition omits one.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Loop iteration cap applied when a loop step omits one.
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;

/// A complete workflow definition.
///
/// # Example YAML
///
/// ```yaml
/// name: lead-digest
/// version: 1.0.0
/// creator:
///   address: "0x52908400098527886E0F7030069857D2E4169EE7"
///   name: Ada
///   revenueShare: 80
/// pricing:
///   basePrice: 0.05
/// inputs:
///   - name: query
///     type: string
/// steps:
///   - id: search
///     type: tool_call
///     server: lead-search
///     function: search_leads
///     params:
///       query: "{{input.query}}"
///   - id: summarize
///     type: ai_decision
///     prompt: "Summarize: {{steps.search.results}}"
///     dependsOn: [search]
/// output: "{{steps.summarize}}"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    /// Unique workflow name (used as identifier)
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Semantic version string
    #[serde(default = "default_version")]
    pub version: String,

    pub creator: Creator,

    pub pricing: Pricing,

    #[serde(default)]
    pub inputs: Vec<WorkflowInput>,

    pub steps: Vec<WorkflowStep>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<WorkflowOutput>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default = "default_true", alias = "is_public")]
    pub is_public: bool,
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

fn default_true() -> bool {
    true
}

/// Who published the workflow and how much of each run they earn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Creator {
    /// Wallet-style payout address
    pub address: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Percentage of each run paid to the creator, 0-100
    #[serde(default = "default_revenue_share", alias = "revenue_share")]
    pub revenue_share: f64,
}

fn default_revenue_share() -> f64 {
    DEFAULT_REVENUE_SHARE
}

/// Advertised price of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    /// Floor price charged for a completed run
    #[serde(alias = "base_price")]
    pub base_price: f64,

    #[serde(default = "default_currency")]
    pub currency: String,

    /// Listed as usage-priced; the charge is always max(base, step costs)
    #[serde(default, alias = "dynamic_pricing")]
    pub dynamic_pricing: bool,
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

/// Declared value type of a workflow input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    #[default]
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl InputType {
    /// Check a concrete value against the declared type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            InputType::String => value.is_string(),
            InputType::Number => value.is_number(),
            InputType::Boolean => value.is_boolean(),
            InputType::Object => value.is_object(),
            InputType::Array => value.is_array(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::String => "string",
            InputType::Number => "number",
            InputType::Boolean => "boolean",
            InputType::Object => "object",
            InputType::Array => "array",
        }
    }
}

/// Input parameter definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowInput {
    pub name: String,

    #[serde(rename = "type", default)]
    pub input_type: InputType,

    /// Filled by the parser: true unless a default is declared.
    #[serde(default = "default_true")]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// What to do once a step has failed and its retries are used up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Abort the rest of the run
    #[default]
    Fail,
    /// Record a null output and continue
    Skip,
    /// Retry up to `retryCount`, then behave like `fail`
    Retry,
}

/// A step in the workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    /// Unique step ID within this workflow
    pub id: String,

    #[serde(flatten)]
    pub kind: StepKind,

    /// Steps that must complete before this one
    #[serde(default, alias = "depends_on", skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(default, alias = "on_error")]
    pub on_error: ErrorPolicy,

    /// Extra attempts after the first failure
    #[serde(default, alias = "retry_count", alias = "retries")]
    pub retry_count: u32,

    #[serde(
        default,
        alias = "estimated_cost",
        skip_serializing_if = "Option::is_none"
    )]
    pub estimated_cost: Option<f64>,
}

/// The five step behaviors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    ToolCall(ToolCallStep),
    AiDecision(AiDecisionStep),
    Transform(TransformStep),
    Condition(ConditionStep),
    Loop(LoopStep),
}

impl StepKind {
    /// Wire name of the variant.
    pub fn name(&self) -> &'static str {
        match self {
            StepKind::ToolCall(_) => "tool_call",
            StepKind::AiDecision(_) => "ai_decision",
            StepKind::Transform(_) => "transform",
            StepKind::Condition(_) => "condition",
            StepKind::Loop(_) => "loop",
        }
    }

    /// Step ids this step runs itself (branch lists, loop body).
    pub fn owned_steps(&self) -> Vec<&str> {
        match self {
            StepKind::Condition(c) => c
                .then
                .iter()
                .chain(c.otherwise.iter())
                .map(String::as_str)
                .collect(),
            StepKind::Loop(l) => l.steps.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Lists of owned step ids, each run in order as one body.
    pub fn bodies(&self) -> Vec<&[String]> {
        match self {
            StepKind::Condition(c) => vec![c.then.as_slice(), c.otherwise.as_slice()],
            StepKind::Loop(l) => vec![l.steps.as_slice()],
            _ => Vec::new(),
        }
    }
}

/// Call a function on a registered remote tool server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallStep {
    /// Target server name, mapped to a base endpoint by the executor
    pub server: String,
    /// Target function name, called at `{endpoint}/tools/{function}`
    pub function: String,
    /// Param name -> template or literal
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// Shape the AI step should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Ask the text-generation collaborator for a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiDecisionStep {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, alias = "output_format")]
    pub output_format: OutputFormat,
}

/// Evaluate an expression over a resolved input and the step results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformStep {
    /// Template resolved before evaluation, bound as `input`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    pub expression: String,
}

/// Pick and run one of two step lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionStep {
    pub expression: String,
    pub then: Vec<String>,
    #[serde(default, rename = "else", skip_serializing_if = "Vec::is_empty")]
    pub otherwise: Vec<String>,
}

/// Run a step list once per element of an array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopStep {
    /// Template resolving to the array to iterate
    pub over: Value,
    /// Name the current element is bound to
    #[serde(default = "default_item_var", rename = "as")]
    pub item_var: String,
    pub steps: Vec<String>,
    #[serde(default = "default_max_iterations", alias = "max_iterations")]
    pub max_iterations: usize,
}

fn default_item_var() -> String {
    "item".to_string()
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

/// How the final output of a run is produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkflowOutput {
    /// A template rendered against the final context
    Template(String),
    /// A structured schema description; the output is the step result map
    Schema { schema: Value },
    /// An object whose leaves are templates
    Mapping(Map<String, Value>),
}

impl WorkflowDefinition {
    /// Get a step by ID.
    pub fn get_step(&self, id: &str) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Get an input declaration by name.
    pub fn get_input(&self, name: &str) -> Option<&WorkflowInput> {
        self.inputs.iter().find(|i| i.name == name)
    }

    /// Map of owned step id -> id of the control step that runs it.
    pub fn owners(&self) -> HashMap<&str, &str> {
        let mut owners = HashMap::new();
        for step in &self.steps {
            for child in step.kind.owned_steps() {
                owners.entry(child).or_insert(step.id.as_str());
            }
        }
        owners
    }

    /// Every step the given step runs, directly or through nested control
    /// steps, in discovery order.
    pub fn descendants(&self, id: &str) -> Vec<&str> {
        let Some(root) = self.get_step(id) else {
            return Vec::new();
        };
        let mut members: Vec<&str> = vec![root.id.as_str()];
        let mut index = 0;
        while index < members.len() {
            if let Some(step) = self.get_step(members[index]) {
                for child in step.kind.owned_steps() {
                    if !members.contains(&child) {
                        members.push(child);
                    }
                }
            }
            index += 1;
        }
        members.remove(0);
        members
    }

    /// Check if this workflow calls remote collaborators.
    pub fn has_remote_steps(&self) -> bool {
        self.steps
            .iter()
            .any(|s| matches!(s.kind, StepKind::ToolCall(_) | StepKind::AiDecision(_)))
    }

    /// Get all step kinds used in this workflow.
    pub fn step_kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<&'static str> = self.steps.iter().map(|s| s.kind.name()).collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }
}
