//! `sleepleague-server`: API server entry point.
//!
//! Startup sequence:
//! 1. Load [`ProcessConfig`] from the environment (and `.env` outside
//!    production).
//! 2. Build the Tokio runtime, applying the blocking-pool hint.
//! 3. Initialise the telemetry pipeline (tracing + optional OTLP).
//! 4. Resolve store credentials and open the document-store session.
//! 5. Verify the data-access façade and mount every route group.
//! 6. Bind the port and serve until SIGINT/SIGTERM.

mod bootstrap;
mod config;
mod data;
mod server;
mod store;
mod telemetry;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use bootstrap::{shutdown_signal, Bootstrap, FatalError};
use config::ProcessConfig;
use store::DynamoConnector;

fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Arc::new(ProcessConfig::load());

    // -----------------------------------------------------------------------
    // 2. Runtime
    // -----------------------------------------------------------------------
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(threads) = cfg.blocking_threads {
        builder.max_blocking_threads(threads);
    }
    let runtime = builder.build().context("failed to build tokio runtime")?;

    let outcome = runtime.block_on(run(cfg));
    telemetry::shutdown_telemetry();
    outcome
}

async fn run(cfg: Arc<ProcessConfig>) -> Result<()> {
    // -----------------------------------------------------------------------
    // 3. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(&cfg).map_err(|e| {
        // Telemetry is not up; write to stderr directly.
        eprintln!("ERROR: telemetry initialisation failed: {e:#}");
        e
    })?;
    for warning in &cfg.warnings {
        warn!(%warning, "configuration");
    }
    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %cfg.environment,
        port = cfg.port,
        blocking_threads = ?cfg.blocking_threads,
        memory_limit_mb = ?cfg.memory_limit_mb,
        "sleepleague-server starting"
    );

    // -----------------------------------------------------------------------
    // 4-6. Store session, façade, routes, listener
    // -----------------------------------------------------------------------
    start(cfg).await.map_err(|e| {
        error!(error = %e, "fatal error, exiting");
        anyhow::Error::new(e).context("server terminated")
    })
}

async fn start(cfg: Arc<ProcessConfig>) -> Result<(), FatalError> {
    Bootstrap::new(cfg, DynamoConnector)
        .prepare()
        .await?
        .bind()
        .await?
        .serve(shutdown_signal())
        .await
}
