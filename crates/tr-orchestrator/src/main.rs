//! taylored-runners orchestrator — serves the control-plane HTTP API and
//! runs the inactivity reaper.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use tr_core::{OrchestratorConfig, ShutdownSignal};
use tr_driver::DockerDriver;
use tr_orchestrator::{api_router, OrchestratorState, Reaper};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    tr_telemetry::logging::init_logging("tr-orchestrator", "info");

    let config = OrchestratorConfig::from_env();
    info!(
        port = config.port,
        reuse_runner_mode = config.reuse_runner_mode,
        inactivity_timeout_secs = config.inactivity_timeout.as_secs(),
        runners_host = %config.runners_host,
        "orchestrator starting"
    );

    let driver = DockerDriver::connect().context("failed to connect to the container daemon")?;
    let state = Arc::new(OrchestratorState::new(config.clone(), Arc::new(driver)));

    let shutdown = ShutdownSignal::new();
    let reaper_handle = Reaper::new(state.clone()).spawn(shutdown.clone());

    // Wire ctrl-c to trigger graceful shutdown.
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                return;
            }
            info!("ctrl-c received, initiating shutdown");
            shutdown.trigger();
        });
    }

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {bind_addr}"))?;
    info!(%bind_addr, "API server listening");

    let mut shutdown_rx = shutdown.subscribe();
    axum::serve(listener, api_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await
        .context("API server error")?;

    reaper_handle.await.ok();
    info!("orchestrator stopped");
    Ok(())
}
