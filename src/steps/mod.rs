//! Step handlers.
//!
//! One handler per step kind. Leaf kinds (tool call, AI decision,
//! transform) produce a [`StepOutput`] directly; control kinds (condition,
//! loop) decide what to run and leave running it to the executor.

mod ai_decision;
mod client;
mod condition;
mod iterate;
mod tool_call;
mod transform;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

pub use ai_decision::{parse_structured, run_ai_decision};
pub use client::{
    HttpTextGenerator, HttpToolClient, ServerDirectory, TextGenerator, ToolClient,
};
pub use condition::{condition_output, evaluate_condition, Branch};
pub use iterate::{iteration_locals, loop_items};
pub use tool_call::run_tool_call;
pub use transform::run_transform;

use crate::config::Config;

/// Result of one leaf step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    /// Value recorded under `steps.<id>`
    pub data: Value,
    /// Charge for this step
    pub cost: f64,
    /// What was charged for (`server.function`, model name)
    pub tool: Option<String>,
}

impl StepOutput {
    /// A local step with no cost.
    pub fn free(data: Value) -> Self {
        Self {
            data,
            cost: 0.0,
            tool: None,
        }
    }
}

/// External services and per-call prices used by step handlers.
#[derive(Clone)]
pub struct Collaborators {
    pub tools: Arc<dyn ToolClient>,
    pub text: Arc<dyn TextGenerator>,
    pub servers: ServerDirectory,
    /// Flat charge per AI decision
    pub ai_cost_per_call: f64,
    /// Tool charge when neither the response nor the step names one
    pub default_tool_cost: f64,
}

impl Collaborators {
    pub fn new(
        tools: Arc<dyn ToolClient>,
        text: Arc<dyn TextGenerator>,
        servers: ServerDirectory,
    ) -> Self {
        let defaults = Config::default();
        Self {
            tools,
            text,
            servers,
            ai_cost_per_call: defaults.agent.cost_per_call,
            default_tool_cost: defaults.tools.default_cost,
        }
    }

    /// HTTP collaborators wired from configuration.
    pub fn from_config(config: &Config) -> Self {
        let tools = HttpToolClient::new(Duration::from_secs(config.tools.timeout_seconds));
        let text = HttpTextGenerator::new(
            config.agent.endpoint.clone(),
            Duration::from_secs(config.agent.timeout_seconds),
        )
        .with_default_model(config.agent.model.clone());

        Self {
            tools: Arc::new(tools),
            text: Arc::new(text),
            servers: ServerDirectory::new(config.servers.clone()),
            ai_cost_per_call: config.agent.cost_per_call,
            default_tool_cost: config.tools.default_cost,
        }
    }

    /// Override the per-call AI price.
    pub fn with_ai_cost(mut self, cost: f64) -> Self {
        self.ai_cost_per_call = cost;
        self
    }

    pub fn with_default_tool_cost(mut self, cost: f64) -> Self {
        self.default_tool_cost = cost;
        self
    }
}
