//! Narrow abstraction over the container daemon.
//!
//! The orchestrator only ever needs six capabilities: probe an image, then
//! create/start/inspect/stop/remove a container. Everything else the daemon
//! offers stays out of the seam. `stop` and `remove` are idempotent — a
//! container that is already gone (or already stopped) counts as success, so
//! deprovision and the reaper can retry freely.

use async_trait::async_trait;

use tr_core::NetworkMode;

pub mod docker;
mod error;
#[cfg(feature = "mock")]
pub mod mock;

pub use docker::DockerDriver;
pub use error::{DriverError, Result};

/// Container label carrying the owning session id.
pub const SESSION_LABEL: &str = "taylored-runner-session-id";

/// Everything the driver needs to create one runner container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Image the container is created from.
    pub image: String,
    /// Session id stored in the [`SESSION_LABEL`] label.
    pub session_id: String,
    /// Port the runner agent listens on inside the container; also injected
    /// as the `PORT` environment variable.
    pub container_port: u16,
    /// Host port to publish the container port to. Ignored in isolated mode.
    pub host_port: Option<u16>,
    pub network: NetworkMode,
}

/// Observed container state, as reported by `inspect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerState {
    pub id: String,
    pub running: bool,
}

/// The capability set the control plane requires from a container daemon.
#[async_trait]
pub trait ContainerDriver: Send + Sync {
    /// Whether `name` resolves to a locally available image.
    async fn image_exists(&self, name: &str) -> Result<bool>;

    /// Create a container from `spec`; returns the daemon-assigned id, which
    /// serves as the handle for every later call.
    async fn create(&self, spec: &ContainerSpec) -> Result<String>;

    async fn start(&self, id: &str) -> Result<()>;

    async fn inspect(&self, id: &str) -> Result<ContainerState>;

    /// Stop the container. Already-stopped and missing containers are success.
    async fn stop(&self, id: &str) -> Result<()>;

    /// Force-remove the container. Missing containers are success.
    async fn remove(&self, id: &str) -> Result<()>;
}
