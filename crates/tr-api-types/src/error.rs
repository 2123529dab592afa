//! Stable error codes surfaced to control-plane clients.

use serde::{Deserialize, Serialize};

/// Machine-readable error kinds carried in the `error` field of failed
/// control-plane responses. The string forms are part of the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// A heartbeat or deprovision request arrived without a session id.
    SessionIdRequired,
    /// No runner record matches the supplied session id.
    RunnerNotFound,
    /// The runner image is not present on the container daemon.
    DockerImageNotFound,
    /// Any other unexpected failure.
    ServerError,
}

impl ErrorCode {
    /// The wire form of this code.
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCode::SessionIdRequired => "SESSION_ID_REQUIRED",
            ErrorCode::RunnerNotFound => "RUNNER_NOT_FOUND",
            ErrorCode::DockerImageNotFound => "DOCKER_IMAGE_NOT_FOUND",
            ErrorCode::ServerError => "SERVER_ERROR",
        }
    }

    /// The HTTP status associated with this code.
    pub const fn status(self) -> u16 {
        match self {
            ErrorCode::SessionIdRequired => 400,
            ErrorCode::RunnerNotFound => 404,
            ErrorCode::DockerImageNotFound | ErrorCode::ServerError => 500,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_form_is_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::DockerImageNotFound).unwrap();
        assert_eq!(json, "\"DOCKER_IMAGE_NOT_FOUND\"");
        assert_eq!(ErrorCode::SessionIdRequired.as_str(), "SESSION_ID_REQUIRED");
    }

    #[test]
    fn status_mapping() {
        assert_eq!(ErrorCode::SessionIdRequired.status(), 400);
        assert_eq!(ErrorCode::RunnerNotFound.status(), 404);
        assert_eq!(ErrorCode::DockerImageNotFound.status(), 500);
        assert_eq!(ErrorCode::ServerError.status(), 500);
    }
}
