//! ParcelScope entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration**: flags and environment variables, with a `.env`
//!    file loaded first (see [`config::Settings`]).
//! 2. **Wire observability**: `tracing-subscriber` with a JSON or compact
//!    formatter and, when an endpoint is configured, an OpenTelemetry OTLP
//!    exporter. All `tracing` spans and structured events emitted by every
//!    crate in the workspace flow through this subscriber.
//! 3. **Construct infrastructure**: the Anthropic knowledge collaborator, the
//!    Bizinfo policy collaborator and the in-memory task store, injected into
//!    the [`orchestrator::TaskOrchestrator`].
//! 4. **Serve**: run the HTTP API until Ctrl-C, then drain in-flight requests.

mod config;
mod telemetry;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use llm::AnthropicKnowledge;
use orchestrator::{InMemoryTaskStore, TaskOrchestrator};
use policy_api::BizinfoPolicies;
use server::AppState;

use crate::config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is normal.
    let _ = dotenvy::dotenv();
    let settings = Settings::parse();

    let telemetry = telemetry::init(settings.log_format, settings.otlp_endpoint.as_deref())?;
    let outcome = run(settings).await;
    if let Err(err) = &outcome {
        tracing::error!("parcelscope exited with an error: {err:#}");
    }
    telemetry.shutdown();
    outcome
}

async fn run(settings: Settings) -> Result<()> {
    let knowledge = AnthropicKnowledge::new(settings.anthropic()?)
        .context("failed to construct the knowledge collaborator")?;
    let policy = BizinfoPolicies::new(settings.bizinfo()?)
        .context("failed to construct the policy collaborator")?;
    let executor = settings.executor();
    info!(
        mode = ?executor.mode,
        max_attempts = executor.max_attempts,
        knowledge_timeout_secs = executor.knowledge_timeout.as_secs(),
        policy_timeout_secs = executor.policy_timeout.as_secs(),
        "pipeline configured"
    );

    let orchestrator = TaskOrchestrator::new(
        Arc::new(InMemoryTaskStore::new()),
        Arc::new(knowledge),
        Arc::new(policy),
        executor,
    );

    let listener = TcpListener::bind(settings.bind)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind))?;
    server::serve(listener, AppState::new(orchestrator), shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
