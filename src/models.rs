//! Core data models for plan execution

use crate::error::OrchestrationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Dependency marker for a step that relies on nothing earlier
pub const NO_DEPENDENCY: &str = "none";

/// A result variable name, trimmed; blank names mean "do not store"
pub fn variable_name(name: Option<&str>) -> Option<&str> {
    name.map(str::trim).filter(|name| !name.is_empty())
}

//
// ================= Strategy =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Strategy {
    SingleTool,
    ParallelTools,
    SequentialTools,
    HybridTools,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::SingleTool,
        Strategy::ParallelTools,
        Strategy::SequentialTools,
        Strategy::HybridTools,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::SingleTool => "SingleTool",
            Strategy::ParallelTools => "ParallelTools",
            Strategy::SequentialTools => "SequentialTools",
            Strategy::HybridTools => "HybridTools",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lenient parse: `single_tool`, `SINGLE-TOOL` and `SingleTool` are the same strategy
impl FromStr for Strategy {
    type Err = OrchestrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_lowercase();

        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str().to_lowercase() == folded)
            .ok_or_else(|| OrchestrationError::UnknownStrategyError(s.to_string()))
    }
}

//
// ================= Plan =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// 1-based position in the plan
    pub step: u32,
    pub tool_name: String,
    /// Always shaped `{"input": ...}`
    pub parameters: Value,
    #[serde(default = "default_dependency")]
    pub dependency: String,
    pub purpose: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_variable: Option<String>,
}

fn default_dependency() -> String {
    NO_DEPENDENCY.to_string()
}

impl ToolCall {
    /// A step is independent when its dependency is `"none"` (or blank)
    pub fn is_independent(&self) -> bool {
        let dependency = self.dependency.trim();
        dependency.is_empty() || dependency.eq_ignore_ascii_case(NO_DEPENDENCY)
    }

    /// The arguments inside the `input` wrapper
    pub fn input(&self) -> Option<&Value> {
        self.parameters.get("input")
    }

    /// Result variable name, ignoring blank names
    pub fn output_variable(&self) -> Option<&str> {
        variable_name(self.result_variable.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub strategy: Strategy,
    pub total_steps: u32,
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub execution_sequence: String,
    #[serde(default)]
    pub reasoning: String,
}

//
// ================= Execution =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolExecutionResult {
    pub tool_name: String,
    pub step: u32,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_variable: Option<String>,
}

impl ToolExecutionResult {
    pub fn succeeded(call: &ToolCall, result: Value, elapsed: Duration) -> Self {
        Self {
            tool_name: call.tool_name.clone(),
            step: call.step,
            success: true,
            result: Some(result),
            error: None,
            execution_time_seconds: elapsed.as_secs_f64(),
            result_variable: call.result_variable.clone(),
        }
    }

    pub fn failed(call: &ToolCall, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            tool_name: call.tool_name.clone(),
            step: call.step,
            success: false,
            result: None,
            error: Some(error.into()),
            execution_time_seconds: elapsed.as_secs_f64(),
            result_variable: call.result_variable.clone(),
        }
    }

    /// Variable this result is published under, if any
    pub fn output_variable(&self) -> Option<&str> {
        variable_name(self.result_variable.as_deref())
    }

    /// Key used in a multi-result `final_result` map
    pub fn result_key(&self) -> String {
        format!("step_{}_{}", self.step, self.tool_name)
    }
}

//
// ================= Tool I/O =================
//

/// Arguments handed to an in-process tool (the `input` wrapper already removed)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInput {
    pub tool_name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub data: Value,
    pub error: Option<String>,
}

impl ToolOutput {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Value::Null,
            error: Some(error.into()),
        }
    }
}

//
// ================= Final Result =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlanResult {
    pub execution_id: Uuid,
    pub success: bool,
    /// Absent when the plan was rejected before its strategy was known
    pub strategy: Option<Strategy>,
    pub total_steps: u32,
    pub tool_results: Vec<ToolExecutionResult>,
    pub final_result: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_log: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub execution_time_ms: u64,
}

impl ExecutionPlanResult {
    /// Results of the steps that succeeded, in execution order
    pub fn successful_results(&self) -> impl Iterator<Item = &ToolExecutionResult> {
        self.tool_results.iter().filter(|r| r.success)
    }

    /// Pretty JSON rendering of the whole report
    pub fn to_json_pretty(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
