use std::sync::Arc;

use tr_core::{OrchestratorConfig, SessionRegistry};
use tr_driver::ContainerDriver;

/// Shared state handed to every request handler and to the reaper.
///
/// The registry is the single source of truth for runner existence; the
/// driver is consulted only to reconcile at provision start and reap end.
pub struct OrchestratorState {
    pub config: OrchestratorConfig,
    pub registry: SessionRegistry,
    pub driver: Arc<dyn ContainerDriver>,
}

impl OrchestratorState {
    pub fn new(config: OrchestratorConfig, driver: Arc<dyn ContainerDriver>) -> Self {
        let registry = SessionRegistry::new(config.reuse_runner_mode);
        Self {
            config,
            registry,
            driver,
        }
    }
}
