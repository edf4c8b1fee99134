//! Error types for the plan orchestrator

use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;

#[derive(Error, Debug)]
pub enum OrchestrationError {

    // =============================
    // Fail-fast (before any step runs)
    // =============================

    #[error("Validation error [{rule}]: {detail}")]
    ValidationError { rule: &'static str, detail: String },

    #[error("Unknown strategy: {0}")]
    UnknownStrategyError(String),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    // =============================
    // Per-step (recovered into ToolExecutionResult)
    // =============================

    #[error("Tool invocation error: {0}")]
    ToolInvocationError(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid tool input: {0}")]
    InvalidToolInput(String),

    #[error("Substitution error: {0}")]
    SubstitutionError(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    // =============================
    // Setup
    // =============================

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
