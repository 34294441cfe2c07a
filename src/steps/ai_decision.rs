//! AI decision step - ask the text generator and optionally read JSON back.

use serde_json::Value;
use tracing::{debug, warn};

use super::{Collaborators, StepOutput};
use crate::error::Result;
use crate::template::{render, Scope};
use crate::workflow::{AiDecisionStep, OutputFormat};

/// Render the prompt, call the generator, and shape the reply.
pub async fn run_ai_decision(
    step: &AiDecisionStep,
    scope: &Scope<'_>,
    collaborators: &Collaborators,
) -> Result<StepOutput> {
    let prompt = render(&step.prompt, scope);
    debug!(
        "AI prompt: {}...",
        prompt.chars().take(100).collect::<String>()
    );

    let content = collaborators
        .text
        .generate(&prompt, step.model.as_deref())
        .await?;

    let data = match step.output_format {
        OutputFormat::Text => Value::String(content),
        OutputFormat::Json => parse_structured(&content),
    };

    Ok(StepOutput {
        data,
        cost: collaborators.ai_cost_per_call,
        tool: Some(step.model.clone().unwrap_or_else(|| "ai".to_string())),
    })
}

/// Parse a reply as JSON, falling back to the first well-formed JSON block
/// inside it, and finally to the raw text.
pub fn parse_structured(content: &str) -> Value {
    if let Ok(parsed) = serde_json::from_str(content.trim()) {
        return parsed;
    }

    if let Some(found) = first_json_block(content) {
        return found;
    }

    warn!("AI reply contained no JSON; keeping raw text");
    Value::String(content.to_string())
}

/// First object or array that parses from some `{` or `[` onward.
fn first_json_block(content: &str) -> Option<Value> {
    content
        .char_indices()
        .filter(|(_, c)| *c == '{' || *c == '[')
        .find_map(|(start, _)| {
            serde_json::Deserializer::from_str(&content[start..])
                .into_iter::<Value>()
                .next()
                .and_then(|parsed| parsed.ok())
                .filter(|v| v.is_object() || v.is_array())
        })
}
