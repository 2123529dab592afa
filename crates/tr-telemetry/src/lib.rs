//! Logging bootstrap and request-correlation middleware shared by the
//! orchestrator and runner binaries.

pub mod logging;
pub mod middleware;
