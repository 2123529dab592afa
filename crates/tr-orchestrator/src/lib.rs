//! Control plane: an HTTP service that provisions, tracks, and
//! garbage-collects runner containers on behalf of remote clients.

pub mod api;
pub mod ports;
pub mod reaper;
pub mod state;

pub use api::api_router;
pub use reaper::Reaper;
pub use state::OrchestratorState;
