//! Tool transport trait and the in-process registry
//!
//! The engine only ever talks to a `ToolTransport`. The registry is the
//! in-process transport; `http` reaches a remote tool server.

use crate::error::OrchestrationError;
use crate::models::{ToolInput, ToolOutput};
use crate::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub mod http;
pub mod math;

pub use http::HttpToolTransport;

/// The external tool-calling transport (`callTool`)
#[async_trait::async_trait]
pub trait ToolTransport: Send + Sync {
    /// Invoke `name` with the full parameter tree (including the `input` wrapper)
    async fn call_tool(&self, name: &str, parameters: &Value) -> Result<Value>;

    /// How many calls may safely overlap; `None` means no limit
    fn max_concurrency(&self) -> Option<usize> {
        None
    }
}

/// Trait for a single in-process tool
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput>;
}

/// Tool registry for looking up and executing tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Registered tool names, sorted
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// (name, description) pairs, sorted by name
    pub fn descriptions(&self) -> Vec<(&str, &'static str)> {
        self.list()
            .into_iter()
            .filter_map(|name| self.tools.get(name).map(|tool| (name, tool.description())))
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ToolTransport for ToolRegistry {
    async fn call_tool(&self, name: &str, parameters: &Value) -> Result<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| OrchestrationError::ToolNotFound(name.to_string()))?;

        let input = ToolInput {
            tool_name: name.to_string(),
            arguments: parameters
                .get("input")
                .cloned()
                .unwrap_or_else(|| parameters.clone()),
        };

        let output = tool.execute(&input).await?;
        if output.success {
            Ok(output.data)
        } else {
            Err(OrchestrationError::ToolInvocationError(
                output
                    .error
                    .unwrap_or_else(|| format!("{} reported failure", name)),
            ))
        }
    }
}

/// Create a registry with the calculator tools
pub fn create_default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    math::register_all(&mut registry);
    registry
}

/// The HTTP transport when `TOOLS_API_BASE_URL` is set, else the calculator registry
pub fn transport_from_env() -> Result<Arc<dyn ToolTransport>> {
    match HttpToolTransport::from_env()? {
        Some(http) => {
            tracing::info!(base_url = %http.base_url(), "Using HTTP tool transport");
            Ok(Arc::new(http))
        }
        None => {
            let registry = create_default_registry();
            tracing::info!(tools = ?registry.list(), "Using built-in calculator tools");
            for (name, description) in registry.descriptions() {
                tracing::debug!(tool_name = name, description, "Registered tool");
            }
            Ok(Arc::new(registry))
        }
    }
}
