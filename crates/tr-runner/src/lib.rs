//! Data plane: the agent that lives inside each runner container. It exposes
//! a WebSocket event channel on the container port, executes snippet
//! requests against an isolated working tree, and serves confined filesystem
//! reads.

pub mod channel;
pub mod executor;
pub mod fsops;

pub use channel::{runner_router, RunnerState};
pub use executor::SnippetExecutor;
