//! taylored-runners agent — listens on the container port and serves the
//! snippet-execution event channel.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use tr_core::RunnerConfig;
use tr_runner::{runner_router, RunnerState};

#[tokio::main]
async fn main() -> Result<()> {
    tr_telemetry::logging::init_logging("tr-runner", "info");

    let config = RunnerConfig::from_env();
    info!(port = config.port, root = %config.root.display(), "runner agent starting");

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind on {bind_addr}"))?;
    info!(%bind_addr, "event channel listening");

    let state = Arc::new(RunnerState::new(config));
    axum::serve(listener, runner_router(state))
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("ctrl-c received, shutting down");
            }
        })
        .await
        .context("runner server error")?;

    info!("runner agent stopped");
    Ok(())
}
