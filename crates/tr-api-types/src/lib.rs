//! Shared wire-format definitions for the taylored-runners control and data
//! planes: HTTP request/response bodies, the event-channel protocol, the
//! client-facing error taxonomy, and the snippet block grammar.

pub mod error;
pub mod events;
pub mod http;
pub mod snippet;

pub use error::ErrorCode;
pub use events::{DirectoryEntry, RunnerRequest, RunnerResponse};
pub use http::{
    ErrorResponse, MessageResponse, ProvisionRequest, ProvisionResponse, SessionRequest,
};
pub use snippet::{first_snippet_id, parse_blocks, SnippetBlock};
