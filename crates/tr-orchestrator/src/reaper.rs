//! Inactivity reaper: collects runners whose sessions have gone quiet.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tr_core::{OrchestratorConfig, RunnerRecord, ShutdownSignal};
use tr_driver::ContainerDriver;

use crate::state::OrchestratorState;

/// Result of a single sweep.
#[derive(Debug, Clone)]
pub struct ReapReport {
    /// Session ids collected during this sweep.
    pub reaped: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Periodic task that stops, removes, and forgets runners idle past the
/// configured inactivity timeout. Sweeps are serialized: one loop, one sweep
/// at a time, so the reaper never races itself on a record.
pub struct Reaper {
    state: Arc<OrchestratorState>,
}

impl Reaper {
    pub fn new(state: Arc<OrchestratorState>) -> Self {
        Self { state }
    }

    /// Spawn the sweep loop. Runs until the shutdown signal fires.
    pub fn spawn(self, shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(OrchestratorConfig::SWEEP_INTERVAL);
            // Consume the immediate first tick so the loop doesn't sweep at t=0.
            interval.tick().await;
            let mut shutdown_rx = shutdown.subscribe();

            info!(
                sweep_secs = OrchestratorConfig::SWEEP_INTERVAL.as_secs(),
                timeout_secs = self.state.config.inactivity_timeout.as_secs(),
                "reaper started"
            );

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let report = self.sweep().await;
                        if !report.reaped.is_empty() {
                            info!(reaped = report.reaped.len(), "reaper sweep collected runners");
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("shutdown signal received, stopping reaper");
                        break;
                    }
                }
            }
        })
    }

    /// Execute one sweep over a snapshot of the registry.
    ///
    /// The expiry decision is re-checked against the live record just before
    /// reaping, so a heartbeat landing between snapshot and teardown wins.
    /// Driver errors are logged and the record is removed regardless.
    pub async fn sweep(&self) -> ReapReport {
        let timeout = self.state.config.inactivity_timeout;
        let mut reaped = Vec::new();

        for record in self.state.registry.snapshot().await {
            let Some(current) = self.state.registry.lookup(&record.session_id).await else {
                continue; // deprovisioned since the snapshot
            };
            if !is_expired(&current, timeout) {
                continue;
            }

            debug!(
                session_id = %current.session_id,
                container_id = %current.container_id,
                "reaping idle runner"
            );

            if let Err(e) = self.state.driver.stop(&current.container_id).await {
                warn!(container_id = %current.container_id, error = %e, "reaper stop failed");
            }
            if let Err(e) = self.state.driver.remove(&current.container_id).await {
                warn!(container_id = %current.container_id, error = %e, "reaper remove failed");
            }

            self.state.registry.remove(&current.session_id).await;
            reaped.push(current.session_id);
        }

        ReapReport {
            reaped,
            timestamp: Utc::now(),
        }
    }
}

fn is_expired(record: &RunnerRecord, timeout: Duration) -> bool {
    let idle = Utc::now()
        .signed_duration_since(record.last_activity)
        .to_std()
        .unwrap_or(Duration::ZERO);
    idle > timeout
}

#[cfg(test)]
mod tests {
    use super::*;
    use tr_core::NetworkMode;

    #[test]
    fn expiry_is_strictly_past_the_timeout() {
        let mut record = RunnerRecord::new("s", "c", Some(49000), NetworkMode::Default);
        assert!(!is_expired(&record, Duration::from_secs(60)));

        record.last_activity = Utc::now() - chrono::Duration::seconds(120);
        assert!(is_expired(&record, Duration::from_secs(60)));

        // A future timestamp (clock skew) never counts as idle.
        record.last_activity = Utc::now() + chrono::Duration::seconds(30);
        assert!(!is_expired(&record, Duration::from_secs(0)));
    }
}
