//! Planner output intake
//!
//! Upstream planners hand over plans in more than one shape: camelCase or
//! snake_case keys, `name`/`args` instead of `tool_name`/`parameters`,
//! dependencies as numbers or lists, sometimes wrapped in prose or a fenced
//! block. Everything is normalized here into one typed `Plan` before the
//! engine sees it.

use crate::error::OrchestrationError;
use crate::models::{Plan, Strategy, ToolCall, NO_DEPENDENCY};
use crate::Result;
use serde_json::{json, Map, Value};

/// Parse planner text: bare JSON, a ```json fenced block, or the largest
/// `{ ... }` block inside surrounding prose.
pub fn parse_plan(text: &str) -> Result<Plan> {
    let value = extract_json_object(text).ok_or_else(|| {
        OrchestrationError::InvalidPlan("no JSON object found in planner output".to_string())
    })?;
    normalize_plan(&value)
}

/// Normalize a raw plan object into a typed `Plan`.
pub fn normalize_plan(raw: &Value) -> Result<Plan> {
    let object = raw
        .as_object()
        .ok_or_else(|| OrchestrationError::InvalidPlan("plan must be a JSON object".to_string()))?;

    let strategy_name = first_str(object, &["strategy", "execution_strategy", "executionStrategy"])
        .ok_or_else(|| OrchestrationError::InvalidPlan("plan has no strategy".to_string()))?;
    let strategy: Strategy = strategy_name.parse()?;

    let raw_calls = first_value(object, &["tool_calls", "toolCalls", "steps"])
        .and_then(Value::as_array)
        .ok_or_else(|| OrchestrationError::InvalidPlan("plan has no tool_calls list".to_string()))?;

    let tool_calls = raw_calls
        .iter()
        .enumerate()
        .map(|(index, call)| normalize_tool_call(call, index))
        .collect::<Result<Vec<_>>>()?;

    let total_steps = match first_value(object, &["total_steps", "totalSteps"]) {
        Some(value) => as_u32(value).ok_or_else(|| {
            OrchestrationError::InvalidPlan(format!("total_steps is not a step count: {}", value))
        })?,
        None => tool_calls.len() as u32,
    };

    Ok(Plan {
        strategy,
        total_steps,
        tool_calls,
        execution_sequence: first_str(object, &["execution_sequence", "executionSequence"])
            .unwrap_or_default()
            .to_string(),
        reasoning: first_str(object, &["reasoning"]).unwrap_or_default().to_string(),
    })
}

/// Normalize one call; `index` supplies the step number when it is missing.
pub fn normalize_tool_call(raw: &Value, index: usize) -> Result<ToolCall> {
    let object = raw.as_object().ok_or_else(|| {
        OrchestrationError::InvalidPlan(format!("tool call #{} must be a JSON object", index + 1))
    })?;

    let step = match first_value(object, &["step", "step_number", "stepNumber"]) {
        Some(value) => as_u32(value).ok_or_else(|| {
            OrchestrationError::InvalidPlan(format!(
                "tool call #{} has an invalid step: {}",
                index + 1,
                value
            ))
        })?,
        None => index as u32 + 1,
    };

    let tool_name = first_str(object, &["tool_name", "toolName", "name", "tool"])
        .ok_or_else(|| {
            OrchestrationError::InvalidPlan(format!("step {} has no tool name", step))
        })?
        .to_string();

    let parameters = wrap_input(
        first_value(object, &["parameters", "params", "args", "arguments"])
            .cloned()
            .unwrap_or_else(|| json!({})),
    )?;

    let dependency = first_value(object, &["dependency", "depends_on", "dependsOn", "dependencies"])
        .map(dependency_text)
        .unwrap_or_else(|| NO_DEPENDENCY.to_string());

    let purpose = first_str(object, &["purpose", "description"])
        .unwrap_or_default()
        .to_string();

    let result_variable = first_str(object, &["result_variable", "resultVariable", "output_variable"])
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string);

    Ok(ToolCall {
        step,
        tool_name,
        parameters,
        dependency,
        purpose,
        result_variable,
    })
}

/// Parameters always end up as `{"input": ...}`; arguments given as JSON text are parsed.
fn wrap_input(parameters: Value) -> Result<Value> {
    let parameters = match parameters {
        Value::String(text) => serde_json::from_str::<Value>(&text).map_err(|e| {
            OrchestrationError::InvalidPlan(format!("parameters are not valid JSON: {}", e))
        })?,
        other => other,
    };

    if parameters.get("input").is_some() {
        Ok(parameters)
    } else {
        Ok(json!({ "input": parameters }))
    }
}

fn dependency_text(value: &Value) -> String {
    match value {
        Value::Null => NO_DEPENDENCY.to_string(),
        Value::String(text) if text.trim().is_empty() => NO_DEPENDENCY.to_string(),
        Value::String(text) => text.trim().to_string(),
        Value::Number(n) => format!("step {}", n),
        Value::Array(items) if items.is_empty() => NO_DEPENDENCY.to_string(),
        Value::Array(items) => {
            let steps: Vec<String> = items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            format!("steps {}", steps.join(", "))
        }
        other => other.to_string(),
    }
}

fn first_value<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|value| !value.is_null())
}

fn first_str<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    first_value(object, keys).and_then(Value::as_str)
}

fn as_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn extract_json_object(text: &str) -> Option<Value> {
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(text.trim()) {
        return Some(value);
    }

    // 1) A ```json ... ``` fenced block
    if let Some(start) = text.find("```json") {
        let after = &text[start + 7..];
        if let Some(end) = after.find("```") {
            if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(after[..end].trim()) {
                return Some(value);
            }
        }
    }

    // 2) Fallback: the largest { ... } block in the text
    let brace_start = text.find('{')?;
    let brace_end = text.rfind('}')?;
    if brace_end <= brace_start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[brace_start..=brace_end]) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}
