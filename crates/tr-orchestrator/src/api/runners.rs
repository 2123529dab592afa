//! Provision / heartbeat / deprovision handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use tr_api_types::{MessageResponse, ProvisionRequest, ProvisionResponse, SessionRequest};
use tr_core::{NetworkMode, OrchestratorConfig, RunnerRecord};
use tr_driver::{ContainerDriver, ContainerSpec};

use crate::api::ApiError;
use crate::ports;
use crate::state::OrchestratorState;

/// `GET /` -- liveness probe.
pub(crate) async fn root() -> &'static str {
    "Orchestrator service is running!"
}

fn header_session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-session-id")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(String::from)
}

/// `POST /api/runner/provision` -- create (or return) the runner for a session.
pub(crate) async fn provision(
    State(state): State<Arc<OrchestratorState>>,
    headers: HeaderMap,
    body: Result<Json<ProvisionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ProvisionResponse>), ApiError> {
    // The body is optional; anything absent or unparseable means defaults.
    let body = body.map(|Json(req)| req).unwrap_or_default();
    let production = state.config.production;
    let host = state.config.runners_host.clone();

    // Reuse mode: every provision returns the shared runner once it exists.
    if state.config.reuse_runner_mode {
        if let Some(record) = state.registry.singleton().await {
            state.registry.touch(&record.session_id).await;
            info!(session_id = %record.session_id, "returning singleton runner");
            return Ok((
                StatusCode::OK,
                Json(ProvisionResponse {
                    message: "Returning existing singleton runner.".to_string(),
                    endpoint: record.endpoint(&host),
                    session_id: record.session_id,
                }),
            ));
        }
    }

    let session_id = header_session_id(&headers).unwrap_or_else(|| Uuid::new_v4().to_string());

    // Per-session mode: a second provision for a known session is a cheap
    // idempotent hit that refreshes the activity timestamp.
    if !state.config.reuse_runner_mode {
        if let Some(record) = state.registry.lookup(&session_id).await {
            state.registry.touch(&session_id).await;
            info!(session_id = %session_id, "provision hit existing runner");
            return Ok((
                StatusCode::OK,
                Json(ProvisionResponse {
                    message: "Runner already exists for this session.".to_string(),
                    endpoint: record.endpoint(&host),
                    session_id,
                }),
            ));
        }
    }

    let network = NetworkMode::from_request(body.network_mode.as_deref());

    let host_port = if network.publishes_port() {
        let port = ports::allocate_host_port()
            .map_err(|e| ApiError::server("Failed to allocate a host port.", e, production))?;
        Some(port)
    } else {
        None
    };

    match state.driver.image_exists(OrchestratorConfig::RUNNER_IMAGE).await {
        Ok(true) => {}
        Ok(false) => {
            return Err(ApiError::ImageNotFound(
                OrchestratorConfig::RUNNER_IMAGE.to_string(),
            ))
        }
        Err(e) => return Err(ApiError::server("Failed to probe the runner image.", e, production)),
    }

    let spec = ContainerSpec {
        image: OrchestratorConfig::RUNNER_IMAGE.to_string(),
        session_id: session_id.clone(),
        container_port: OrchestratorConfig::CONTAINER_PORT,
        host_port,
        network: network.clone(),
    };

    let container_id = state
        .driver
        .create(&spec)
        .await
        .map_err(|e| ApiError::server("Failed to create the runner container.", e, production))?;

    if let Err(e) = state.driver.start(&container_id).await {
        rollback(&state, &container_id).await;
        return Err(ApiError::server("Failed to start the runner container.", e, production));
    }

    let inspected = match state.driver.inspect(&container_id).await {
        Ok(inspected) => inspected,
        Err(e) => {
            rollback(&state, &container_id).await;
            return Err(ApiError::server("Failed to inspect the runner container.", e, production));
        }
    };

    let record = RunnerRecord::new(session_id.clone(), inspected.id, host_port, network.clone());
    let endpoint = record.endpoint(&host);
    if let Err(e) = state.registry.insert(record).await {
        // Lost a race with a concurrent provision. Discard our container and
        // answer with the winner's record.
        rollback(&state, &container_id).await;
        let existing = if state.config.reuse_runner_mode {
            state.registry.singleton().await
        } else {
            state.registry.lookup(&session_id).await
        };
        let Some(existing) = existing else {
            return Err(ApiError::server("Failed to register the runner.", e, production));
        };
        let message = if state.config.reuse_runner_mode {
            "Returning existing singleton runner."
        } else {
            "Runner already exists for this session."
        };
        return Ok((
            StatusCode::OK,
            Json(ProvisionResponse {
                message: message.to_string(),
                endpoint: existing.endpoint(&host),
                session_id: existing.session_id,
            }),
        ));
    }

    info!(
        session_id = %session_id,
        container_id = %container_id,
        network = %network,
        endpoint = %endpoint,
        "runner provisioned"
    );

    Ok((
        StatusCode::CREATED,
        Json(ProvisionResponse {
            message: "Runner provisioned successfully.".to_string(),
            endpoint,
            session_id,
        }),
    ))
}

/// Best-effort stop+remove of a container whose provision failed. The
/// registry never saw it, so a zombie container is the worst outcome.
async fn rollback(state: &OrchestratorState, container_id: &str) {
    if let Err(e) = state.driver.stop(container_id).await {
        warn!(container_id = %container_id, error = %e, "rollback stop failed");
    }
    if let Err(e) = state.driver.remove(container_id).await {
        warn!(container_id = %container_id, error = %e, "rollback remove failed");
    }
}

fn required_session_id(
    headers: &HeaderMap,
    body: Result<Json<SessionRequest>, JsonRejection>,
) -> Result<String, ApiError> {
    body.ok()
        .and_then(|Json(req)| req.session_id)
        .filter(|id| !id.trim().is_empty())
        .or_else(|| header_session_id(headers))
        .ok_or(ApiError::SessionIdRequired)
}

/// `POST /api/runner/heartbeat` -- refresh a runner's last-activity timestamp.
pub(crate) async fn heartbeat(
    State(state): State<Arc<OrchestratorState>>,
    headers: HeaderMap,
    body: Result<Json<SessionRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let session_id = required_session_id(&headers, body)?;

    let known = if state.config.reuse_runner_mode {
        match state.registry.singleton().await {
            Some(record) if record.session_id == session_id => {
                state.registry.touch(&session_id).await
            }
            _ => false,
        }
    } else {
        state.registry.touch(&session_id).await
    };

    if !known {
        return Err(ApiError::RunnerNotFound);
    }

    Ok(Json(MessageResponse {
        message: "Heartbeat received.".to_string(),
    }))
}

/// `POST /api/runner/deprovision` -- tear down a session's runner.
pub(crate) async fn deprovision(
    State(state): State<Arc<OrchestratorState>>,
    headers: HeaderMap,
    body: Result<Json<SessionRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let session_id = required_session_id(&headers, body)?;

    if state.config.reuse_runner_mode {
        return Ok(Json(MessageResponse {
            message: "Deprovisioning is disabled in reuse mode.".to_string(),
        }));
    }

    // Remove the registry entry first: we prefer leaking a zombie container
    // over leaking a registry slot.
    let record = state
        .registry
        .remove(&session_id)
        .await
        .ok_or(ApiError::RunnerNotFound)?;

    let mut failure = None;
    if let Err(e) = state.driver.stop(&record.container_id).await {
        error!(session_id = %session_id, container_id = %record.container_id, error = %e, "stop failed during deprovision");
        failure = Some(e);
    }
    if let Err(e) = state.driver.remove(&record.container_id).await {
        error!(session_id = %session_id, container_id = %record.container_id, error = %e, "remove failed during deprovision");
        failure = Some(e);
    }

    if let Some(e) = failure {
        return Err(ApiError::server(
            "Failed to tear down the runner container.",
            e,
            state.config.production,
        ));
    }

    info!(session_id = %session_id, container_id = %record.container_id, "runner deprovisioned");
    Ok(Json(MessageResponse {
        message: format!("Runner for session {session_id} deprovisioned successfully."),
    }))
}
