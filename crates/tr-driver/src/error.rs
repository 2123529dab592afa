use thiserror::Error;

pub type Result<T> = std::result::Result<T, DriverError>;

/// Driver failures, classified into the stable kinds the control plane maps
/// onto client-facing error codes. Raw daemon identifiers never cross this
/// boundary. A missing image is not an error here; `image_exists` reports it
/// as `Ok(false)`.
#[derive(Debug, Clone, Error)]
pub enum DriverError {
    #[error("container not found: {0}")]
    NotFound(String),

    #[error("container daemon error: {0}")]
    Daemon(String),
}
