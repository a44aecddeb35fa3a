use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;

use taskmesh::command::CommandRouter;
use taskmesh::config::{OrchestratorConfig, WorkerConfig};
use taskmesh::dispatch::HttpDispatch;
use taskmesh::error::ConfigError;
use taskmesh::orchestrator::{OrchestratorState, orchestrator_routes};
use taskmesh::task::TaskRegistry;
use taskmesh::worker::{Executor, HttpEventReporter, WorkerState, worker_routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let role = std::env::args().nth(1).unwrap_or_default();
    match role.as_str() {
        "orchestrator" => run_orchestrator().await.context("orchestrator failed"),
        "worker" => run_worker().await.context("worker failed"),
        other => {
            eprintln!("usage: taskmesh <orchestrator|worker>");
            Err(ConfigError::UnknownRole(other.to_string()).into())
        }
    }
}

async fn run_orchestrator() -> taskmesh::error::Result<()> {
    let config = OrchestratorConfig::from_env()?;

    eprintln!("taskmesh orchestrator v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Listen: {}", config.listen);
    for worker in &config.workers {
        eprintln!("   Worker: {} -> {}", worker.id, worker.addr);
    }

    let router = CommandRouter::new(
        Arc::new(TaskRegistry::new()),
        config.workers.clone(),
        Arc::new(HttpDispatch::new(config.dispatch_timeout)?),
    );
    let app = orchestrator_routes(OrchestratorState::new(router));

    let listener = TcpListener::bind(&config.listen).await?;
    tracing::info!(addr = %config.listen, "Orchestrator started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn run_worker() -> taskmesh::error::Result<()> {
    let config = WorkerConfig::from_env()?;

    eprintln!("taskmesh worker v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Agent: {}", config.agent_id);
    eprintln!("   Listen: {}", config.listen);
    eprintln!("   Orchestrator: {}", config.orchestrator_addr);
    eprintln!(
        "   Plan: {} steps every {:?}",
        config.plan.steps, config.plan.step_interval
    );

    let reporter = HttpEventReporter::new(&config.orchestrator_addr, config.report_timeout)?;
    tracing::debug!(url = %reporter.url(), "Reporting events");
    let reporter = Arc::new(reporter);
    let executor = Arc::new(Executor::new(&config.agent_id, config.plan, reporter));
    let app = worker_routes(WorkerState {
        executor: Arc::clone(&executor),
    });

    let listener = TcpListener::bind(&config.listen).await?;
    tracing::info!(addr = %config.listen, agent = %config.agent_id, "Worker started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    executor.shutdown(config.shutdown_grace).await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
