//! Tool call step - invoke a function on a registered tool server.

use serde_json::Value;
use tracing::debug;

use super::{Collaborators, StepOutput};
use crate::error::Result;
use crate::template::{resolve_value, Scope};
use crate::workflow::ToolCallStep;

/// Resolve params, call the server, and price the call.
///
/// Cost comes from the response's `meta.cost`, then the step's
/// `estimatedCost`, then the configured default.
pub async fn run_tool_call(
    step: &ToolCallStep,
    estimated_cost: Option<f64>,
    scope: &Scope<'_>,
    collaborators: &Collaborators,
) -> Result<StepOutput> {
    let params = resolve_value(&Value::Object(step.params.clone()), scope);
    let endpoint = collaborators.servers.endpoint(&step.server)?;

    debug!(server = %step.server, function = %step.function, "Resolved tool call");

    let response = collaborators
        .tools
        .call(endpoint, &step.function, &params)
        .await?;

    let cost = reported_cost(&response)
        .or(estimated_cost)
        .unwrap_or(collaborators.default_tool_cost);

    Ok(StepOutput {
        data: response,
        cost,
        tool: Some(format!("{}.{}", step.server, step.function)),
    })
}

/// Read a non-negative `meta.cost` hint.
pub(crate) fn reported_cost(response: &Value) -> Option<f64> {
    response
        .pointer("/meta/cost")
        .and_then(Value::as_f64)
        .filter(|c| c.is_finite() && *c >= 0.0)
}
