//! Control-plane error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use tr_api_types::{ErrorCode, ErrorResponse};

/// Errors surfaced by the runner lifecycle handlers. Each variant maps to a
/// stable [`ErrorCode`] on the wire; driver errors are remapped here and
/// never reach clients raw.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("a session id is required")]
    SessionIdRequired,

    #[error("no runner found for this session")]
    RunnerNotFound,

    #[error("image {0} not found on the container daemon")]
    ImageNotFound(String),

    #[error("{message}")]
    Server {
        message: String,
        /// Included in the response body only outside production.
        details: Option<String>,
    },
}

impl ApiError {
    /// An unexpected failure. `details` carries the underlying error text
    /// unless `production` is set.
    pub fn server(message: impl Into<String>, source: impl ToString, production: bool) -> Self {
        ApiError::Server {
            message: message.into(),
            details: (!production).then(|| source.to_string()),
        }
    }

    fn code(&self) -> ErrorCode {
        match self {
            ApiError::SessionIdRequired => ErrorCode::SessionIdRequired,
            ApiError::RunnerNotFound => ErrorCode::RunnerNotFound,
            ApiError::ImageNotFound(_) => ErrorCode::DockerImageNotFound,
            ApiError::Server { .. } => ErrorCode::ServerError,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();
        let status = StatusCode::from_u16(code.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let (message, details) = match self {
            ApiError::SessionIdRequired => ("A session id is required.".to_string(), None),
            ApiError::RunnerNotFound => ("No runner found for this session.".to_string(), None),
            ApiError::ImageNotFound(image) => (
                format!("Image '{image}' not found. Build it before provisioning runners."),
                None,
            ),
            ApiError::Server { message, details } => (message, details),
        };

        let body = Json(ErrorResponse {
            error: code.as_str().to_string(),
            message,
            details,
        });
        (status, body).into_response()
    }
}
