//! Environment-derived configuration for both binaries.
//!
//! Both structs read their values through `from_lookup` so tests can inject
//! variables without touching process-global environment state.

use std::path::PathBuf;
use std::time::Duration;

/// Control-plane configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Listen port (`PORT`).
    pub port: u16,
    /// Idle threshold after which the reaper collects a runner
    /// (`INACTIVITY_TIMEOUT_SECONDS`).
    pub inactivity_timeout: Duration,
    /// Serve a single shared runner to every client (`REUSE_RUNNER_MODE`).
    pub reuse_runner_mode: bool,
    /// Hostname interpolated into reported endpoints (`RUNNERS_HOST`).
    pub runners_host: String,
    /// `NODE_ENV == "production"`; suppresses error details in 500 bodies.
    pub production: bool,
}

impl OrchestratorConfig {
    /// Reaper sweep cadence.
    pub const SWEEP_INTERVAL: Duration = Duration::from_secs(30);
    /// Image every runner container is created from.
    pub const RUNNER_IMAGE: &'static str = "runner-image";
    /// Port the runner agent listens on inside its container.
    pub const CONTAINER_PORT: u16 = 3000;

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            port: parse_or(lookup("PORT"), 3001),
            inactivity_timeout: Duration::from_secs(parse_or(
                lookup("INACTIVITY_TIMEOUT_SECONDS"),
                60,
            )),
            reuse_runner_mode: parse_bool(lookup("REUSE_RUNNER_MODE")),
            runners_host: lookup("RUNNERS_HOST")
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| "localhost".to_string()),
            production: lookup("NODE_ENV").as_deref() == Some("production"),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

/// Data-plane (runner agent) configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Listen port (`PORT`).
    pub port: u16,
    /// Absolute directory prefix confining all filesystem operations
    /// (`RUNNER_ROOT`).
    pub root: PathBuf,
}

impl RunnerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            port: parse_or(lookup("PORT"), 3000),
            root: lookup("RUNNER_ROOT")
                .filter(|r| !r.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/")),
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, fallback: T) -> T {
    raw.and_then(|v| v.parse().ok()).unwrap_or(fallback)
}

fn parse_bool(raw: Option<String>) -> bool {
    matches!(raw.as_deref(), Some("true") | Some("1"))
}
