//! Loop step - resolve the array and build per-iteration bindings.

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::template::{resolve_value, Scope};
use crate::workflow::LoopStep;

/// Resolve `over` to the elements to iterate.
///
/// Anything other than an array is a step error, as is an array longer than
/// `maxIterations`.
pub fn loop_items(step: &LoopStep, scope: &Scope<'_>) -> Result<Vec<Value>> {
    match resolve_value(&step.over, scope) {
        Value::Array(items) if items.len() > step.max_iterations => Err(Error::Step(format!(
            "Loop over {} items exceeds maxIterations ({})",
            items.len(),
            step.max_iterations
        ))),
        Value::Array(items) => Ok(items),
        Value::Null => Err(Error::Step(
            "Loop 'over' resolved to null, expected an array".to_string(),
        )),
        other => Err(Error::Step(format!(
            "Loop 'over' must resolve to an array, got {}",
            crate::workflow::json_type_name(&other)
        ))),
    }
}

/// Bindings visible to one iteration: the outer locals plus `item_var` and `index`.
pub fn iteration_locals(
    item_var: &str,
    item: Value,
    index: usize,
    parent: Option<&Map<String, Value>>,
) -> Map<String, Value> {
    let mut locals = parent.cloned().unwrap_or_default();
    locals.insert(item_var.to_string(), item);
    locals.insert("index".to_string(), Value::from(index));
    locals
}
