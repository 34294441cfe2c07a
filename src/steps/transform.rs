//! Transform step - evaluate an expression locally.

use super::StepOutput;
use crate::error::Result;
use crate::expr;
use crate::template::{resolve_value, Scope};
use crate::workflow::TransformStep;

/// Resolve the optional `input` template, bind it as `input`, and evaluate.
pub fn run_transform(step: &TransformStep, scope: &Scope<'_>) -> Result<StepOutput> {
    let bound = step.input.as_ref().map(|template| resolve_value(template, scope));
    let context = expr::context(scope, bound.as_ref());
    let data = expr::evaluate(&step.expression, &context)?;
    Ok(StepOutput::free(data))
}
