//! Environment-driven configuration

use crate::error::OrchestrationError;
use crate::Result;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Knobs for the execution engine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutorConfig {
    /// Upper bound on in-flight calls within one parallel group
    pub max_parallelism: Option<usize>,
    /// Per-invocation timeout
    pub step_timeout: Option<Duration>,
    /// Whole-plan deadline; expiry cancels the execution
    pub plan_timeout: Option<Duration>,
}

impl ExecutorConfig {
    /// Read `ORCHESTRATOR_MAX_PARALLELISM`, `ORCHESTRATOR_STEP_TIMEOUT_SECS`
    /// and `ORCHESTRATOR_PLAN_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_parallelism: Option<usize> = parse_var(&lookup, "ORCHESTRATOR_MAX_PARALLELISM")?;
        if max_parallelism == Some(0) {
            return Err(OrchestrationError::ConfigError(
                "ORCHESTRATOR_MAX_PARALLELISM must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            max_parallelism,
            step_timeout: parse_secs(&lookup, "ORCHESTRATOR_STEP_TIMEOUT_SECS")?,
            plan_timeout: parse_secs(&lookup, "ORCHESTRATOR_PLAN_TIMEOUT_SECS")?,
        })
    }
}

/// Settings for the HTTP tool transport
#[derive(Debug, Clone, PartialEq)]
pub struct HttpTransportConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub max_concurrency: Option<usize>,
}

impl HttpTransportConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            max_concurrency: None,
        }
    }

    /// `None` when `TOOLS_API_BASE_URL` is unset
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Option<Self>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(base_url) = lookup("TOOLS_API_BASE_URL").filter(|v| !v.trim().is_empty()) else {
            return Ok(None);
        };

        let mut config = Self::new(base_url.trim());
        if let Some(timeout) = parse_secs(&lookup, "TOOLS_API_TIMEOUT_SECS")? {
            config.timeout = timeout;
        }
        config.max_concurrency = parse_var(&lookup, "TOOLS_API_MAX_CONCURRENCY")?;

        Ok(Some(config))
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            OrchestrationError::ConfigError(format!("{} has invalid value {:?}", key, raw))
        }),
    }
}

fn parse_secs<F>(lookup: &F, key: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: Option<f64> = parse_var(lookup, key)?;
    match secs {
        Some(s) if s.is_finite() && s > 0.0 => Ok(Some(Duration::from_secs_f64(s))),
        Some(_) => Err(OrchestrationError::ConfigError(format!(
            "{} must be a positive number of seconds",
            key
        ))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = ExecutorConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ExecutorConfig::default());
        assert_eq!(HttpTransportConfig::from_lookup(lookup(&[])).unwrap(), None);
    }

    #[test]
    fn executor_values_are_parsed() {
        let config = ExecutorConfig::from_lookup(lookup(&[
            ("ORCHESTRATOR_MAX_PARALLELISM", "4"),
            ("ORCHESTRATOR_STEP_TIMEOUT_SECS", "2.5"),
            ("ORCHESTRATOR_PLAN_TIMEOUT_SECS", "60"),
        ]))
        .unwrap();

        assert_eq!(config.max_parallelism, Some(4));
        assert_eq!(config.step_timeout, Some(Duration::from_millis(2500)));
        assert_eq!(config.plan_timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn invalid_values_are_errors() {
        let err = ExecutorConfig::from_lookup(lookup(&[("ORCHESTRATOR_MAX_PARALLELISM", "lots")]))
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::ConfigError(_)));

        assert!(ExecutorConfig::from_lookup(lookup(&[("ORCHESTRATOR_MAX_PARALLELISM", "0")])).is_err());
        assert!(ExecutorConfig::from_lookup(lookup(&[("ORCHESTRATOR_STEP_TIMEOUT_SECS", "-1")])).is_err());
    }

    #[test]
    fn http_transport_settings() {
        let config = HttpTransportConfig::from_lookup(lookup(&[
            ("TOOLS_API_BASE_URL", "http://tools.internal:9000/"),
            ("TOOLS_API_MAX_CONCURRENCY", "2"),
        ]))
        .unwrap()
        .unwrap();

        assert_eq!(config.base_url, "http://tools.internal:9000");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_concurrency, Some(2));
    }
}
