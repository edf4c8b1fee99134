//! Result-variable substitution
//!
//! Walks a parameter tree and replaces `${{name}}` placeholders with values
//! produced by earlier steps. The input tree is never modified and nothing
//! is serialized and re-parsed, so a stored value can only ever land where a
//! placeholder stood.

use crate::error::OrchestrationError;
use crate::Result;
use serde_json::Value;
use std::collections::HashMap;

/// Per-execution map of result variable name to stored value
pub type ResultVariables = HashMap<String, Value>;

const PLACEHOLDER_OPEN: &str = "${{";
const PLACEHOLDER_CLOSE: &str = "}}";

/// Resolve every placeholder that has a value; leave the rest untouched.
pub fn resolve_parameters(parameters: &Value, variables: &ResultVariables) -> Value {
    resolve_tree(parameters, variables, &mut Vec::new())
}

/// Resolve, then refuse to run if a leaf that was nothing but a placeholder
/// referenced a variable that has not been produced.
///
/// Only references in the input tree count. A stored value that happens to
/// look like a placeholder is data and is never treated as a reference.
pub fn resolve_for_invocation(parameters: &Value, variables: &ResultVariables) -> Result<Value> {
    let mut missing = Vec::new();
    let resolved = resolve_tree(parameters, variables, &mut missing);

    if missing.is_empty() {
        Ok(resolved)
    } else {
        Err(OrchestrationError::SubstitutionError(format!(
            "unresolved result variable(s): {}",
            missing.join(", ")
        )))
    }
}

/// Every variable name referenced anywhere in the tree, whole or embedded.
pub fn referenced_variables(parameters: &Value) -> Vec<String> {
    let mut names = Vec::new();
    collect_references(parameters, &mut names);
    names
}

/// `missing` collects whole-leaf references with no value, in tree order
fn resolve_tree(value: &Value, variables: &ResultVariables, missing: &mut Vec<String>) -> Value {
    match value {
        Value::String(text) => resolve_string(text, variables, missing),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_tree(item, variables, missing))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), resolve_tree(value, variables, missing)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn collect_references(value: &Value, names: &mut Vec<String>) {
    match value {
        Value::String(text) => {
            for (_, _, name) in placeholder_spans(text) {
                push_unique(names, name);
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_references(item, names)),
        Value::Object(map) => map.values().for_each(|item| collect_references(item, names)),
        _ => {}
    }
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}

fn resolve_string(text: &str, variables: &ResultVariables, missing: &mut Vec<String>) -> Value {
    if let Some(name) = whole_placeholder(text) {
        return match variables.get(name) {
            Some(value) => unwrap_result(value),
            None => {
                push_unique(missing, name);
                Value::String(text.to_string())
            }
        };
    }

    let spans = placeholder_spans(text);
    if spans.is_empty() {
        return Value::String(text.to_string());
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (start, end, name) in spans {
        out.push_str(&text[cursor..start]);
        match variables.get(name) {
            Some(value) => out.push_str(&display_value(value)),
            None => out.push_str(&text[start..end]),
        }
        cursor = end;
    }
    out.push_str(&text[cursor..]);

    Value::String(out)
}

/// The variable name if `text` is exactly one placeholder (surrounding whitespace allowed)
fn whole_placeholder(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let spans = placeholder_spans(trimmed);
    match spans.as_slice() {
        [(0, end, name)] if *end == trimmed.len() => Some(*name),
        _ => None,
    }
}

/// (start, end, name) of every well-formed placeholder in `text`
fn placeholder_spans(text: &str) -> Vec<(usize, usize, &str)> {
    let mut spans = Vec::new();
    let mut offset = 0;

    while let Some(found) = text[offset..].find(PLACEHOLDER_OPEN) {
        let start = offset + found;
        let name_start = start + PLACEHOLDER_OPEN.len();

        let Some(close) = text[name_start..].find(PLACEHOLDER_CLOSE) else {
            break;
        };

        let name_end = name_start + close;
        let end = name_end + PLACEHOLDER_CLOSE.len();
        let name = text[name_start..name_end].trim();

        if is_variable_name(name) {
            spans.push((start, end, name));
            offset = end;
        } else {
            offset = name_start;
        }
    }

    spans
}

fn is_variable_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Peel `{"result": ...}` envelopes, including ones stored as JSON text.
fn unwrap_result(value: &Value) -> Value {
    let mut current = value.clone();

    loop {
        let next = match &current {
            Value::Object(map) => map.get("result").cloned(),
            Value::String(text) => match serde_json::from_str::<Value>(text.trim()) {
                Ok(Value::Object(map)) => map.get("result").cloned(),
                _ => None,
            },
            _ => None,
        };

        match next {
            Some(inner) => current = inner,
            None => return current,
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(entries: &[(&str, Value)]) -> ResultVariables {
        entries
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn whole_leaf_takes_the_value_itself() {
        let params = json!({"input": {"a": "${{X}}", "b": 2}});
        let resolved = resolve_parameters(&params, &vars(&[("X", json!(0.5))]));

        assert_eq!(resolved, json!({"input": {"a": 0.5, "b": 2}}));
    }

    #[test]
    fn whole_leaf_tolerates_inner_whitespace() {
        let params = json!({"input": {"a": " ${{ X }} "}});
        let resolved = resolve_parameters(&params, &vars(&[("X", json!(7))]));

        assert_eq!(resolved, json!({"input": {"a": 7}}));
    }

    #[test]
    fn whole_leaf_unwraps_result_envelopes() {
        let params = json!({"input": {"a": "${{obj}}", "b": "${{text}}"}});
        let variables = vars(&[
            ("obj", json!({"result": {"result": 42}})),
            ("text", json!(r#"{"result": "done", "extra": 1}"#)),
        ]);

        let resolved = resolve_parameters(&params, &variables);
        assert_eq!(resolved, json!({"input": {"a": 42, "b": "done"}}));
    }

    #[test]
    fn embedded_token_uses_string_form() {
        let params = json!({"input": {"query": "total is ${{sum}} for ${{who}}"}});
        let variables = vars(&[("sum", json!(62)), ("who", json!("alice"))]);

        let resolved = resolve_parameters(&params, &variables);
        assert_eq!(resolved, json!({"input": {"query": "total is 62 for alice"}}));
    }

    #[test]
    fn lists_and_nested_maps_are_walked() {
        let params = json!({"input": {"values": ["${{a}}", {"deep": "${{b}}"}, 3]}});
        let variables = vars(&[("a", json!(1)), ("b", json!([1, 2]))]);

        let resolved = resolve_parameters(&params, &variables);
        assert_eq!(resolved, json!({"input": {"values": [1, {"deep": [1, 2]}, 3]}}));
    }

    #[test]
    fn missing_reference_is_left_untouched() {
        let params = json!({"input": {"a": "${{later}}", "note": "see ${{later}}"}});
        let resolved = resolve_parameters(&params, &ResultVariables::new());

        assert_eq!(resolved, params);
    }

    #[test]
    fn input_tree_is_not_mutated() {
        let params = json!({"input": {"a": "${{X}}"}});
        let before = params.clone();
        let _ = resolve_parameters(&params, &vars(&[("X", json!(1))]));

        assert_eq!(params, before);
    }

    #[test]
    fn resolution_is_repeatable() {
        let params = json!({"input": {"a": "${{X}}", "s": "x=${{X}}"}});
        let variables = vars(&[("X", json!({"result": 3}))]);

        assert_eq!(
            resolve_parameters(&params, &variables),
            resolve_parameters(&params, &variables)
        );
    }

    #[test]
    fn invocation_fails_only_for_whole_leaf_gaps() {
        let variables = ResultVariables::new();

        let embedded = json!({"input": {"query": "about ${{topic}}"}});
        assert!(resolve_for_invocation(&embedded, &variables).is_ok());

        let whole = json!({"input": {"a": "${{topic}}"}});
        let err = resolve_for_invocation(&whole, &variables).unwrap_err();
        assert!(matches!(err, OrchestrationError::SubstitutionError(ref m) if m.contains("topic")));
    }

    #[test]
    fn object_keys_are_not_substituted() {
        let params = json!({"input": {"${{X}}": 1}});
        let resolved = resolve_parameters(&params, &vars(&[("X", json!("k"))]));

        assert_eq!(resolved, params);
    }

    #[test]
    fn malformed_tokens_are_plain_text() {
        let params = json!({"input": {"a": "${{not closed", "b": "${{bad name}}"}});
        let resolved = resolve_parameters(&params, &vars(&[("bad name", json!(1))]));

        assert_eq!(resolved, params);
        assert!(resolve_for_invocation(&params, &ResultVariables::new()).is_ok());
    }

    #[test]
    fn placeholder_shaped_values_are_not_references() {
        let params = json!({"input": {"text": "${{X}}", "note": "got ${{X}}"}});
        let variables = vars(&[("X", json!("${{Y}}"))]);

        let resolved = resolve_for_invocation(&params, &variables).unwrap();
        assert_eq!(resolved, json!({"input": {"text": "${{Y}}", "note": "got ${{Y}}"}}));
    }

    #[test]
    fn every_missing_whole_leaf_is_named_once() {
        let params = json!({"input": {"a": "${{p}}", "b": ["${{q}}", "${{p}}"], "c": "${{r}}"}});
        let variables = vars(&[("r", json!(1))]);

        let err = resolve_for_invocation(&params, &variables).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Substitution error: unresolved result variable(s): p, q"
        );
    }

    #[test]
    fn referenced_variables_lists_each_name_once() {
        let params = json!({"input": {"a": "${{x}}", "b": "${{x}} and ${{y}}"}});
        assert_eq!(referenced_variables(&params), vec!["x".to_string(), "y".to_string()]);
    }
}
