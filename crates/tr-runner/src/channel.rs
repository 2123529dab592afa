//! The WebSocket event channel.
//!
//! One connection carries many interleaved requests. Each inbound event is
//! dispatched onto its own task, so a long-running snippet never blocks a
//! directory listing; every task streams its responses through a shared
//! outbound writer. Chunks of one child stream keep their read order, but
//! events for different snippet ids may interleave freely.

use std::ops::ControlFlow;
use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    http::Method,
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tower_http::cors::{Any, CorsLayer};

use tr_api_types::{RunnerRequest, RunnerResponse};
use tr_core::RunnerConfig;

use crate::executor::SnippetExecutor;
use crate::fsops;

/// Outbound event buffer per connection. Child-process output applies
/// backpressure through the channel when a client reads slowly.
const OUTBOUND_BUFFER: usize = 64;

/// Shared state for every connection.
pub struct RunnerState {
    pub config: RunnerConfig,
    pub executor: SnippetExecutor,
}

impl RunnerState {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            executor: SnippetExecutor::new(),
        }
    }

    pub fn with_executor(config: RunnerConfig, executor: SnippetExecutor) -> Self {
        Self { config, executor }
    }
}

/// Build the runner router: a liveness probe and the event channel. The
/// channel is CORS-permissive so browser clients can connect from anywhere.
pub fn runner_router(state: Arc<RunnerState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/ws", get(ws_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST]),
        )
        .with_state(state)
}

async fn root() -> &'static str {
    "Runner agent is running!"
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<RunnerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_channel(socket, state))
}

async fn handle_channel(socket: WebSocket, state: Arc<RunnerState>) {
    info!("event channel connected");
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (tx, mut rx) = mpsc::channel::<RunnerResponse>(OUTBOUND_BUFFER);

    // Single writer: serializes every outbound event onto the socket.
    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    warn!(error = %e, "failed to serialize outbound event");
                    continue;
                }
            };
            if ws_tx.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(incoming) = ws_rx.next().await {
        match incoming {
            Ok(Message::Text(text)) => {
                if dispatch(&state, &tx, text.as_str()).is_break() {
                    break;
                }
            }
            Ok(Message::Close(_)) | Err(_) => break,
            // Pings/pongs are answered by the library; binary frames are not
            // part of the protocol.
            _ => {}
        }
    }

    // The writer winds down on its own: once every request task drops its
    // sender (or its first send to the closed socket fails), the channel
    // closes and the task exits. Waiting here would block on still-running
    // snippet children.
    drop(tx);
    drop(writer);
    info!("event channel disconnected");
}

/// Route one inbound event onto its own task.
fn dispatch(
    state: &Arc<RunnerState>,
    tx: &mpsc::Sender<RunnerResponse>,
    text: &str,
) -> ControlFlow<()> {
    let request: RunnerRequest = match serde_json::from_str(text) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "unparseable event");
            let tx = tx.clone();
            let error = format!("Invalid request: {e}");
            tokio::spawn(async move {
                let _ = tx
                    .send(RunnerResponse::TayloredRunError { id: None, error })
                    .await;
            });
            return ControlFlow::Continue(());
        }
    };

    match request {
        RunnerRequest::TayloredRun { body } => {
            let executor = state.executor.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                executor.run(body, tx).await;
            });
        }
        RunnerRequest::ListDirectory { path } => {
            let root = state.config.root.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let response = fsops::list_directory(&root, path).await;
                let _ = tx.send(response).await;
            });
        }
        RunnerRequest::DownloadFile { path } => {
            let root = state.config.root.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let response = fsops::download_file(&root, path).await;
                let _ = tx.send(response).await;
            });
        }
        RunnerRequest::Disconnect => {
            debug!("client requested disconnect");
            return ControlFlow::Break(());
        }
    }
    ControlFlow::Continue(())
}
