//! REST API server for the plan orchestrator
//!
//! Accepts raw planner output, validates it or executes it, and returns the
//! result wrapped in `ApiResponse`.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::execution::ExecutionEngine;
use crate::intake;
use crate::models::ExecutionPlanResult;
use crate::resolver;

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Mirrors the report's outcome and carries the full report as data
    pub fn from_execution(report: &ExecutionPlanResult) -> Self {
        Self {
            success: report.success,
            data: serde_json::to_value(report).ok(),
            error: report.error.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<ExecutionEngine>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Plan Endpoints
/// =============================

async fn validate_plan(
    State(state): State<ApiState>,
    Json(raw): Json<Value>,
) -> (StatusCode, Json<ApiResponse>) {
    let plan = match intake::normalize_plan(&raw) {
        Ok(plan) => plan,
        Err(e) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    };

    let violations = state.engine.validator().violations(&plan);
    info!(
        strategy = %plan.strategy,
        total_steps = plan.total_steps,
        violations = violations.len(),
        "Validated plan"
    );

    let references: Vec<Value> = plan
        .tool_calls
        .iter()
        .filter_map(|call| {
            let variables = resolver::referenced_variables(&call.parameters);
            (!variables.is_empty()).then(|| json!({"step": call.step, "variables": variables}))
        })
        .collect();

    let data = json!({
        "plan": plan,
        "valid": violations.is_empty(),
        "violations": violations,
        "references": references,
    });

    match violations.first() {
        None => (StatusCode::OK, Json(ApiResponse::success(data))),
        Some(first) => {
            let mut response = ApiResponse::error(format!(
                "Validation error [{}]: {}",
                first.rule, first.detail
            ));
            response.data = Some(data);
            (StatusCode::UNPROCESSABLE_ENTITY, Json(response))
        }
    }
}

async fn execute_plan(
    State(state): State<ApiState>,
    Json(raw): Json<Value>,
) -> (StatusCode, Json<ApiResponse>) {
    let report = state.engine.execute_value(&raw, None).await;

    info!(
        execution_id = %report.execution_id,
        success = report.success,
        "Plan executed via API"
    );

    (StatusCode::OK, Json(ApiResponse::from_execution(&report)))
}

/// =============================
/// Router
/// =============================

pub fn create_router(engine: Arc<ExecutionEngine>) -> Router {
    let state = ApiState { engine };

    Router::new()
        .route("/health", get(health))
        .route("/v1/plans/validate", post(validate_plan))
        .route("/v1/plans/execute", post(execute_plan))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    engine: Arc<ExecutionEngine>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(engine);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
