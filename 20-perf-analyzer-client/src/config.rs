//! Where the cluster lives and what it is expected to look like.

use std::time::Duration;

pub const DEFAULT_SCHEME: &str = "http";
pub const DEFAULT_HOSTNAME: &str = "localhost";
pub const DEFAULT_PORT: u16 = 9200;
/// The analyzer serves metrics from its own port, not the REST port.
pub const DEFAULT_METRICS_PORT: u16 = 9600;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

pub const DEFAULT_VERSION: &str = "7.3.2";
pub const DEFAULT_NODES: [&str; 2] = ["elasticsearch1", "elasticsearch2"];

/// Expected cluster topology, checked by `Host::verify_cluster_config`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    version: String,
    nodes: Vec<String>,
}

impl ClusterConfig {
    pub fn new(version: impl Into<String>, nodes: Vec<String>) -> Self {
        Self {
            version: version.into(),
            nodes,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn expects_node(&self, name: &str) -> bool {
        self.nodes.iter().any(|node| node == name)
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_VERSION,
            DEFAULT_NODES.iter().map(|node| node.to_string()).collect(),
        )
    }
}

/// Address and timeout settings for one cluster endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub scheme: String,
    pub hostname: String,
    pub port: u16,
    pub metrics_port: u16,
    pub timeout: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_string(),
            hostname: DEFAULT_HOSTNAME.to_string(),
            port: DEFAULT_PORT,
            metrics_port: DEFAULT_METRICS_PORT,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl HostConfig {
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.hostname, self.port)
    }

    pub fn metrics_base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.hostname, self.metrics_port)
    }
}
