//! Calculator tools
//!
//! Deterministic arithmetic used by the CLI demo and tests. Arguments are
//! `a` (and `b` for binary operations), given as numbers or numeric strings.

use super::{Tool, ToolRegistry};
use crate::error::OrchestrationError;
use crate::models::{ToolInput, ToolOutput};
use crate::Result;
use serde_json::{json, Value};
use std::sync::Arc;

/// Largest n whose factorial fits in an f64
const MAX_FACTORIAL: f64 = 170.0;

type UnaryFn = fn(f64) -> std::result::Result<f64, String>;
type BinaryFn = fn(f64, f64) -> std::result::Result<f64, String>;

pub struct UnaryTool {
    name: &'static str,
    description: &'static str,
    op: UnaryFn,
}

pub struct BinaryTool {
    name: &'static str,
    description: &'static str,
    op: BinaryFn,
}

#[async_trait::async_trait]
impl Tool for UnaryTool {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        self.description
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let a = number_arg(&input.arguments, "a")?;
        Ok(match (self.op)(a) {
            Ok(value) => ToolOutput::ok(number_value(value)),
            Err(message) => ToolOutput::failure(message),
        })
    }
}

#[async_trait::async_trait]
impl Tool for BinaryTool {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        self.description
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let a = number_arg(&input.arguments, "a")?;
        let b = number_arg(&input.arguments, "b")?;
        Ok(match (self.op)(a, b) {
            Ok(value) => ToolOutput::ok(number_value(value)),
            Err(message) => ToolOutput::failure(message),
        })
    }
}

fn number_arg(arguments: &Value, key: &str) -> Result<f64> {
    match arguments.get(key) {
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| {
            OrchestrationError::InvalidToolInput(format!("'{}' is not representable as f64", key))
        }),
        Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| {
            OrchestrationError::InvalidToolInput(format!("'{}' is not a number: {:?}", key, s))
        }),
        Some(other) => Err(OrchestrationError::InvalidToolInput(format!(
            "'{}' must be a number, got {}",
            key, other
        ))),
        None => Err(OrchestrationError::InvalidToolInput(format!(
            "missing argument '{}'",
            key
        ))),
    }
}

/// Whole results become JSON integers
fn number_value(value: f64) -> Value {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.007_199_254_740_992e15 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

fn finite(value: f64) -> std::result::Result<f64, String> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err("result is not a finite number".to_string())
    }
}

fn divide(a: f64, b: f64) -> std::result::Result<f64, String> {
    if b == 0.0 {
        Err("Division by zero".to_string())
    } else {
        finite(a / b)
    }
}

fn sqrt(a: f64) -> std::result::Result<f64, String> {
    if a < 0.0 {
        Err(format!("Cannot take square root of negative number {}", a))
    } else {
        Ok(a.sqrt())
    }
}

fn factorial(a: f64) -> std::result::Result<f64, String> {
    if a < 0.0 || a.fract() != 0.0 {
        return Err(format!("Factorial requires a non-negative integer, got {}", a));
    }
    if a > MAX_FACTORIAL {
        return Err(format!("Factorial of {} overflows", a));
    }
    Ok((1..=a as u64).fold(1.0, |acc, n| acc * n as f64))
}

/// Register every calculator tool
pub fn register_all(registry: &mut ToolRegistry) {
    let binary: [(&'static str, &'static str, BinaryFn); 5] = [
        ("add", "Add a and b", |a, b| finite(a + b)),
        ("subtract", "Subtract b from a", |a, b| finite(a - b)),
        ("multiply", "Multiply a by b", |a, b| finite(a * b)),
        ("divide", "Divide a by b", divide),
        ("power", "Raise a to the power b", |a, b| finite(a.powf(b))),
    ];
    for (name, description, op) in binary {
        registry.register(Arc::new(BinaryTool {
            name,
            description,
            op,
        }));
    }

    let unary: [(&'static str, &'static str, UnaryFn); 5] = [
        ("square", "Square a", |a| finite(a * a)),
        ("sqrt", "Square root of a", sqrt),
        ("factorial", "Factorial of a", factorial),
        ("sin", "Sine of a (radians)", |a| Ok(a.sin())),
        ("cos", "Cosine of a (radians)", |a| Ok(a.cos())),
    ];
    for (name, description, op) in unary {
        registry.register(Arc::new(UnaryTool {
            name,
            description,
            op,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{create_default_registry, ToolTransport};

    async fn run(tool: &str, arguments: Value) -> Result<Value> {
        create_default_registry()
            .call_tool(tool, &json!({ "input": arguments }))
            .await
    }

    #[tokio::test]
    async fn whole_results_are_integers() {
        assert_eq!(run("add", json!({"a": 25, "b": 37})).await.unwrap(), json!(62));
        assert_eq!(run("factorial", json!({"a": 5})).await.unwrap(), json!(120));
        assert_eq!(run("square", json!({"a": 4})).await.unwrap(), json!(16));
        assert_eq!(run("divide", json!({"a": 1, "b": 4})).await.unwrap(), json!(0.25));
    }

    #[tokio::test]
    async fn numeric_strings_are_accepted() {
        assert_eq!(run("multiply", json!({"a": "3", "b": 2})).await.unwrap(), json!(6));
    }

    #[tokio::test]
    async fn sine_of_half_pi_is_one() {
        let value = run("sin", json!({"a": 1.5707963})).await.unwrap();
        assert!((value.as_f64().unwrap() - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn domain_errors_fail_the_call() {
        let err = run("divide", json!({"a": 10, "b": 0})).await.unwrap_err();
        assert!(err.to_string().contains("Division by zero"));

        assert!(run("sqrt", json!({"a": -1})).await.is_err());
        assert!(run("factorial", json!({"a": 2.5})).await.is_err());
        assert!(run("factorial", json!({"a": 171})).await.is_err());
    }

    #[tokio::test]
    async fn bad_arguments_are_invalid_input() {
        let err = run("add", json!({"a": 1})).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::InvalidToolInput(_)));

        let err = run("square", json!({"a": "${{X}}"})).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::InvalidToolInput(_)));
    }
}
