use tool_plan_orchestrator::{
    api::start_server, config::ExecutorConfig, execution::ExecutionEngine,
    tools::transport_from_env,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("Tool Plan Orchestrator - API Server");
    info!("Port: {}", api_port);

    let engine = Arc::new(ExecutionEngine::with_config(
        transport_from_env()?,
        ExecutorConfig::from_env()?,
    ));

    let config = engine.config();
    info!(
        max_parallelism = ?config.max_parallelism,
        step_timeout = ?config.step_timeout,
        plan_timeout = ?config.plan_timeout,
        "Executor configured"
    );

    info!("Execution engine initialized");
    start_server(engine, api_port).await?;

    Ok(())
}
