//! HTTP tool transport
//!
//! Calls a remote tool server with `POST {base}/tools/call` and
//! `{"name": ..., "arguments": ...}`. Uses a long-lived reqwest::Client for
//! connection pooling.

use super::ToolTransport;
use crate::config::HttpTransportConfig;
use crate::error::OrchestrationError;
use crate::Result;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const CALL_PATH: &str = "/tools/call";

#[derive(Clone)]
pub struct HttpToolTransport {
    client: Client,
    base_url: String,
    max_concurrency: Option<usize>,
}

impl HttpToolTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(config.max_concurrency.unwrap_or(8))
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url,
            max_concurrency: config.max_concurrency,
        })
    }

    /// `None` when `TOOLS_API_BASE_URL` is unset
    pub fn from_env() -> Result<Option<Self>> {
        HttpTransportConfig::from_env()?.map(Self::new).transpose()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                OrchestrationError::ToolInvocationError(format!(
                    "Tool server request failed for {}: {}",
                    path, e
                ))
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            OrchestrationError::ToolInvocationError(format!("Unreadable tool server response: {}", e))
        })?;

        if !status.is_success() {
            return Err(OrchestrationError::ToolInvocationError(format!(
                "Tool server returned {} for {}: {}",
                status, path, text
            )));
        }

        // Non-JSON bodies are passed on as text
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

#[async_trait::async_trait]
impl ToolTransport for HttpToolTransport {
    async fn call_tool(&self, name: &str, parameters: &Value) -> Result<Value> {
        debug!(tool_name = %name, base_url = %self.base_url, "Calling remote tool");
        self.post_json(
            CALL_PATH,
            &json!({
                "name": name,
                "arguments": parameters,
            }),
        )
        .await
    }

    fn max_concurrency(&self) -> Option<usize> {
        self.max_concurrency
    }
}
