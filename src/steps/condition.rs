//! Condition step - choose a branch.

use serde_json::{json, Value};

use crate::error::Result;
use crate::expr;
use crate::template::Scope;
use crate::workflow::ConditionStep;

/// The branch a condition picked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Branch<'a> {
    pub result: bool,
    /// `then` or `else`
    pub name: &'static str,
    pub steps: &'a [String],
}

/// Evaluate the condition and pick the step list to run.
pub fn evaluate_condition<'a>(step: &'a ConditionStep, scope: &Scope<'_>) -> Result<Branch<'a>> {
    let context = expr::context(scope, None);
    let result = expr::evaluate_bool(&step.expression, &context)?;

    Ok(if result {
        Branch {
            result,
            name: "then",
            steps: &step.then,
        }
    } else {
        Branch {
            result,
            name: "else",
            steps: &step.otherwise,
        }
    })
}

/// Output recorded for the condition step once its branch has run.
pub fn condition_output(branch: &Branch<'_>, executed: &[String]) -> Value {
    json!({
        "result": branch.result,
        "branch": branch.name,
        "executed": executed,
    })
}
