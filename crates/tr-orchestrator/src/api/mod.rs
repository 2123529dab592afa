//! HTTP API: router construction and the runner lifecycle handlers.

mod error;
mod runners;

pub use error::ApiError;

use std::sync::Arc;

use axum::{
    http::{header::CONTENT_TYPE, HeaderName, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use tr_telemetry::middleware::request_id_middleware;

use crate::state::OrchestratorState;

/// Build the control-plane router.
pub fn api_router(state: Arc<OrchestratorState>) -> Router {
    Router::new()
        .route("/", get(runners::root))
        .route("/api/runner/provision", post(runners::provision))
        .route("/api/runner/heartbeat", post(runners::heartbeat))
        .route("/api/runner/deprovision", post(runners::deprovision))
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([CONTENT_TYPE, HeaderName::from_static("x-session-id")]),
        )
        .with_state(state)
}
