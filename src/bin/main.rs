use tool_plan_orchestrator::{
    config::ExecutorConfig, execution::ExecutionEngine, intake, tools::transport_from_env,
};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Executes one plan, read from the file named on the command line or from stdin,
/// and prints the execution report as JSON.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let text = match std::env::args().nth(1) {
        Some(path) if path != "-" => {
            info!(path = %path, "Reading plan file");
            tokio::fs::read_to_string(&path).await?
        }
        _ => {
            info!("Reading plan from stdin");
            let mut buffer = String::new();
            tokio::io::stdin().read_to_string(&mut buffer).await?;
            buffer
        }
    };

    let plan = intake::parse_plan(&text)?;
    info!(
        strategy = %plan.strategy,
        total_steps = plan.total_steps,
        "Plan loaded"
    );

    let engine = ExecutionEngine::with_config(transport_from_env()?, ExecutorConfig::from_env()?);

    // Ctrl-C cancels the run; completed steps are still reported
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling execution");
                cancel.cancel();
            }
        });
    }

    let report = engine.execute(&plan, Some(cancel)).await;

    info!(
        succeeded = report.successful_results().count(),
        total_steps = report.total_steps,
        elapsed_ms = report.execution_time_ms,
        "Execution complete"
    );
    println!("{}", report.to_json_pretty()?);

    if !report.success {
        std::process::exit(1);
    }
    Ok(())
}
