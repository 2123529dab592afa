use chrono::{DateTime, Utc};

/// How a runner container is attached to the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkMode {
    /// Publish the container port to an allocated host port.
    Default,
    /// Attach to a named network; the host port is still published.
    Custom(String),
    /// No port publication and no attached network.
    None,
}

impl NetworkMode {
    /// Interpret the optional `networkMode` field of a provision request.
    /// Absent, empty, or `"default"` all mean the default configuration.
    pub fn from_request(raw: Option<&str>) -> Self {
        match raw {
            None | Some("") | Some("default") => NetworkMode::Default,
            Some("none") => NetworkMode::None,
            Some(name) => NetworkMode::Custom(name.to_string()),
        }
    }

    /// Whether this mode publishes the container port to the host.
    pub fn publishes_port(&self) -> bool {
        !matches!(self, NetworkMode::None)
    }

    /// The tag used in logs and labels: `default`, `custom:<name>`, `none`.
    pub fn tag(&self) -> String {
        match self {
            NetworkMode::Default => "default".to_string(),
            NetworkMode::Custom(name) => format!("custom:{name}"),
            NetworkMode::None => "none".to_string(),
        }
    }
}

impl std::fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.tag())
    }
}

/// Control-plane record of one live runner container.
#[derive(Debug, Clone)]
pub struct RunnerRecord {
    /// Session identifier; unique key in the registry.
    pub session_id: String,
    /// Container id, usable as the driver handle for the container's lifetime.
    pub container_id: String,
    /// Allocated host port; absent in isolated network mode.
    pub host_port: Option<u16>,
    /// Last provision/heartbeat activity. Compared against the inactivity
    /// timeout by the reaper; wall-clock precision is sufficient.
    pub last_activity: DateTime<Utc>,
    pub network_mode: NetworkMode,
}

impl RunnerRecord {
    pub fn new(
        session_id: impl Into<String>,
        container_id: impl Into<String>,
        host_port: Option<u16>,
        network_mode: NetworkMode,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            container_id: container_id.into(),
            host_port,
            last_activity: Utc::now(),
            network_mode,
        }
    }

    /// The endpoint string reported to clients.
    pub fn endpoint(&self, host: &str) -> String {
        match self.host_port {
            Some(port) => format!("{host}:{port}"),
            None => "N/A (isolated network mode)".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_mode_from_request() {
        assert_eq!(NetworkMode::from_request(None), NetworkMode::Default);
        assert_eq!(NetworkMode::from_request(Some("")), NetworkMode::Default);
        assert_eq!(NetworkMode::from_request(Some("default")), NetworkMode::Default);
        assert_eq!(NetworkMode::from_request(Some("none")), NetworkMode::None);
        assert_eq!(
            NetworkMode::from_request(Some("overlay1")),
            NetworkMode::Custom("overlay1".to_string())
        );
    }

    #[test]
    fn only_isolated_mode_skips_port_publication() {
        assert!(NetworkMode::Default.publishes_port());
        assert!(NetworkMode::Custom("n".into()).publishes_port());
        assert!(!NetworkMode::None.publishes_port());
    }

    #[test]
    fn endpoint_formatting() {
        let record = RunnerRecord::new("s1", "c1", Some(49200), NetworkMode::Default);
        assert_eq!(record.endpoint("localhost"), "localhost:49200");

        let isolated = RunnerRecord::new("s2", "c2", None, NetworkMode::None);
        assert_eq!(isolated.endpoint("localhost"), "N/A (isolated network mode)");
    }
}
