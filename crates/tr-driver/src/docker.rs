//! [`ContainerDriver`] implementation over the local Docker daemon socket.

use std::collections::HashMap;

use bollard::errors::Error as BollardError;
use bollard::models::{ContainerCreateBody, HostConfig, PortBinding};
use bollard::query_parameters::{
    CreateContainerOptions, InspectContainerOptions, RemoveContainerOptionsBuilder,
    StartContainerOptions, StopContainerOptionsBuilder,
};
use bollard::Docker;
use tracing::{debug, warn};

use async_trait::async_trait;
use tr_core::NetworkMode;

use crate::{ContainerDriver, ContainerSpec, ContainerState, DriverError, Result, SESSION_LABEL};

/// Seconds a container gets to exit on its own before `stop` kills it.
const STOP_GRACE_SECS: i32 = 10;

pub struct DockerDriver {
    docker: Docker,
}

impl DockerDriver {
    /// Connect through the platform's local daemon socket
    /// (`/var/run/docker.sock` on Unix).
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults().map_err(daemon_error)?;
        Ok(Self { docker })
    }
}

/// Translate a [`ContainerSpec`] into the daemon's create payload. Kept as a
/// standalone function so the port-binding / label / network mapping can be
/// tested without a daemon.
fn build_create_body(spec: &ContainerSpec) -> ContainerCreateBody {
    let mut labels = HashMap::new();
    labels.insert(SESSION_LABEL.to_string(), spec.session_id.clone());

    let env = vec![format!("PORT={}", spec.container_port)];
    let port_key = format!("{}/tcp", spec.container_port);

    let (exposed_ports, host_config) = match &spec.network {
        NetworkMode::None => (
            None,
            Some(HostConfig {
                network_mode: Some("none".to_string()),
                ..Default::default()
            }),
        ),
        mode => {
            let binding = PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: spec.host_port.map(|p| p.to_string()),
            };
            let mut bindings = HashMap::new();
            bindings.insert(port_key.clone(), Some(vec![binding]));

            let mut exposed = HashMap::new();
            exposed.insert(port_key, HashMap::new());

            let network_mode = match mode {
                NetworkMode::Custom(name) => Some(name.clone()),
                _ => None,
            };
            (
                Some(exposed),
                Some(HostConfig {
                    port_bindings: Some(bindings),
                    network_mode,
                    ..Default::default()
                }),
            )
        }
    };

    ContainerCreateBody {
        image: Some(spec.image.clone()),
        env: Some(env),
        labels: Some(labels),
        exposed_ports,
        host_config,
        ..Default::default()
    }
}

#[async_trait]
impl ContainerDriver for DockerDriver {
    async fn image_exists(&self, name: &str) -> Result<bool> {
        match self.docker.inspect_image(name).await {
            Ok(_) => Ok(true),
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(daemon_error(e)),
        }
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<String> {
        let body = build_create_body(spec);
        let response = self
            .docker
            .create_container(None::<CreateContainerOptions>, body)
            .await
            .map_err(daemon_error)?;
        for warning in &response.warnings {
            warn!(container_id = %response.id, warning, "daemon warning on create");
        }
        debug!(container_id = %response.id, session_id = %spec.session_id, "container created");
        Ok(response.id)
    }

    async fn start(&self, id: &str) -> Result<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions>)
            .await
            .map_err(daemon_error)
    }

    async fn inspect(&self, id: &str) -> Result<ContainerState> {
        let response = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(daemon_error)?;
        Ok(ContainerState {
            id: response.id.unwrap_or_else(|| id.to_string()),
            running: response
                .state
                .and_then(|state| state.running)
                .unwrap_or(false),
        })
    }

    async fn stop(&self, id: &str) -> Result<()> {
        match self
            .docker
            .stop_container(
                id,
                Some(StopContainerOptionsBuilder::default().t(STOP_GRACE_SECS).build()),
            )
            .await
        {
            Ok(()) => Ok(()),
            // 304: already stopped; 404: already gone. Both are success for
            // an idempotent stop.
            Err(BollardError::DockerResponseServerError {
                status_code: 304 | 404,
                ..
            }) => Ok(()),
            Err(e) => Err(daemon_error(e)),
        }
    }

    async fn remove(&self, id: &str) -> Result<()> {
        match self
            .docker
            .remove_container(
                id,
                Some(RemoveContainerOptionsBuilder::default().force(true).build()),
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(()),
            Err(e) => Err(daemon_error(e)),
        }
    }
}

fn daemon_error(e: BollardError) -> DriverError {
    match e {
        BollardError::DockerResponseServerError {
            status_code: 404,
            message,
        } => DriverError::NotFound(message),
        other => DriverError::Daemon(other.to_string()),
    }
}
