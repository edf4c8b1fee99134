//! Fixtures shared by unit tests

use crate::error::OrchestrationError;
use crate::models::{Plan, Strategy, ToolCall, ToolInput, ToolOutput, NO_DEPENDENCY};
use crate::tools::{create_default_registry, Tool, ToolRegistry, ToolTransport};
use crate::Result;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Independent call with `arguments` wrapped in the `input` envelope
pub fn call(step: u32, tool: &str, arguments: Value) -> ToolCall {
    ToolCall {
        step,
        tool_name: tool.to_string(),
        parameters: json!({ "input": arguments }),
        dependency: NO_DEPENDENCY.to_string(),
        purpose: format!("Run {} for step {}", tool, step),
        result_variable: None,
    }
}

pub fn depends(mut call: ToolCall, dependency: &str) -> ToolCall {
    call.dependency = dependency.to_string();
    call
}

pub fn stores(mut call: ToolCall, variable: &str) -> ToolCall {
    call.result_variable = Some(variable.to_string());
    call
}

pub fn plan(strategy: Strategy, tool_calls: Vec<ToolCall>) -> Plan {
    Plan {
        strategy,
        total_steps: tool_calls.len() as u32,
        tool_calls,
        execution_sequence: "as listed".to_string(),
        reasoning: "Fixture plan exercising the execution engine".to_string(),
    }
}

/// Returns its arguments unchanged
pub struct EchoTool;

#[async_trait::async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn description(&self) -> &'static str {
        "Return the arguments it was given"
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        Ok(ToolOutput::ok(input.arguments.clone()))
    }
}

/// Sleeps far longer than any test waits
pub struct SlowTool;

#[async_trait::async_trait]
impl Tool for SlowTool {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn description(&self) -> &'static str {
        "Never finishes within a test"
    }

    async fn execute(&self, _input: &ToolInput) -> Result<ToolOutput> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(ToolOutput::ok(json!("finally")))
    }
}

/// Calculator registry plus `echo` and `slow`
pub fn fixture_registry() -> ToolRegistry {
    let mut registry = create_default_registry();
    registry.register(Arc::new(EchoTool));
    registry.register(Arc::new(SlowTool));
    registry
}

/// Transport that records calls and measures overlap
pub struct RecordingTransport {
    inner: ToolRegistry,
    delay: Duration,
    limit: Option<usize>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<(String, Value)>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            inner: fixture_registry(),
            delay: Duration::ZERO,
            limit: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_names(&self) -> Vec<String> {
        self.calls().into_iter().map(|(name, _)| name).collect()
    }
}

#[async_trait::async_trait]
impl ToolTransport for RecordingTransport {
    async fn call_tool(&self, name: &str, parameters: &Value) -> Result<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), parameters.clone()));

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let outcome = self.inner.call_tool(name, parameters).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    fn max_concurrency(&self) -> Option<usize> {
        self.limit
    }
}

/// Transport whose every call fails with the given message
pub struct BrokenTransport(pub &'static str);

#[async_trait::async_trait]
impl ToolTransport for BrokenTransport {
    async fn call_tool(&self, _name: &str, _parameters: &Value) -> Result<Value> {
        Err(OrchestrationError::ToolInvocationError(self.0.to_string()))
    }
}
