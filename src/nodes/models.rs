//! Node registry records and probe results

use crate::error::{HostmonError, IoResultExt, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Port used when a registry entry omits one
pub const DEFAULT_NODE_PORT: u16 = 3000;

fn default_port() -> u16 {
    DEFAULT_NODE_PORT
}

/// A remote node as recorded in the registry
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    /// Registry identifier
    pub id: String,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Host name or IP address
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bearer credential sent with every request
    #[serde(default, alias = "api_key", skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    /// Last known status
    #[serde(default)]
    pub status: NodeStatus,
}

impl NodeDescriptor {
    /// Create a descriptor with the default port and no credential
    pub fn new(id: impl Into<String>, host: impl Into<String>) -> Self {
        NodeDescriptor {
            id: id.into(),
            name: None,
            host: host.into(),
            port: DEFAULT_NODE_PORT,
            credential: None,
            status: NodeStatus::Unknown,
        }
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the bearer credential
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Name for logs: display name if set, else the id
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Full URL for `path` on this node
    pub fn url(&self, path: &str) -> String {
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        let path = path.trim_start_matches('/');
        format!("http://{}:{}/{}", host, self.port, path)
    }
}

impl fmt::Debug for NodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("status", &self.status)
            .finish()
    }
}

/// Load a JSON registry file (an array of descriptors)
pub fn load_registry(path: &Path) -> Result<Vec<NodeDescriptor>> {
    let content = std::fs::read_to_string(path).with_path(path)?;
    let nodes: Vec<NodeDescriptor> = serde_json::from_str(&content).map_err(|e| {
        HostmonError::config(format!("invalid node registry '{}': {}", path.display(), e))
    })?;

    for (index, node) in nodes.iter().enumerate() {
        if node.id.trim().is_empty() || node.host.trim().is_empty() {
            return Err(HostmonError::config(format!(
                "node registry '{}': entry {} needs an id and a host",
                path.display(),
                index
            )));
        }
        if node.port == 0 {
            return Err(HostmonError::config(format!(
                "node registry '{}': node '{}' has port 0",
                path.display(),
                node.id
            )));
        }
    }

    Ok(nodes)
}

/// Persisted node status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// Never probed
    #[default]
    Unknown,
    Online,
    Offline,
}

impl NodeStatus {
    /// Status after applying a probe result.
    ///
    /// Moves from any state straight to the probed state; there is no
    /// intermediate or sticky state.
    pub fn apply(self, result: &NodeHealthResult) -> NodeStatus {
        match result.status {
            HealthStatus::Online => NodeStatus::Online,
            HealthStatus::Offline => NodeStatus::Offline,
        }
    }
}

/// Outcome of a single health probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Online,
    Offline,
}

/// Why a node request failed
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeFailure {
    /// No response within the bound
    #[error("timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    /// Connection could not be established or was dropped
    #[error("unreachable: {reason}")]
    Unreachable { reason: String },

    /// Answered with a status other than 200
    #[error("unexpected response status {status}")]
    UnexpectedResponse { status: u16 },

    /// Answered 200 with a body that is not JSON
    #[error("invalid payload: {reason}")]
    InvalidPayload { reason: String },
}

impl NodeFailure {
    /// Check if a later probe could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            NodeFailure::Timeout { .. } | NodeFailure::Unreachable { .. } => true,
            NodeFailure::UnexpectedResponse { status } => *status >= 500,
            NodeFailure::InvalidPayload { .. } => false,
        }
    }
}

/// Result of probing one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeHealthResult {
    pub node_id: String,
    pub status: HealthStatus,
    /// Round-trip time, present iff online
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// Failure, present iff offline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<NodeFailure>,
    pub timestamp: DateTime<Utc>,
}

impl NodeHealthResult {
    /// Online result with a measured latency
    pub fn online(node_id: impl Into<String>, latency_ms: u64) -> Self {
        NodeHealthResult {
            node_id: node_id.into(),
            status: HealthStatus::Online,
            latency_ms: Some(latency_ms),
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Offline result carrying the failure
    pub fn offline(node_id: impl Into<String>, failure: NodeFailure) -> Self {
        NodeHealthResult {
            node_id: node_id.into(),
            status: HealthStatus::Offline,
            latency_ms: None,
            error: Some(failure),
            timestamp: Utc::now(),
        }
    }

    pub fn is_online(&self) -> bool {
        self.status == HealthStatus::Online
    }
}

/// Metrics payload fetched from a node
#[derive(Debug, Clone, Serialize)]
pub struct NodeMetrics {
    pub node_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    /// Remote payload, with any top-level `data` wrapper removed
    pub metrics: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Print probe results to console
pub fn print_health_results(nodes: &[NodeDescriptor], results: &[NodeHealthResult]) {
    println!("=== Node Health ===\n");
    for (node, result) in nodes.iter().zip(results) {
        match (&result.latency_ms, &result.error) {
            (Some(latency), _) => {
                println!("[ok] {} ({}:{}) {} ms", node.label(), node.host, node.port, latency)
            }
            (None, Some(failure)) => {
                println!("[!!] {} ({}:{}) {}", node.label(), node.host, node.port, failure)
            }
            (None, None) => println!("[??] {} ({}:{})", node.label(), node.host, node.port),
        }
    }

    let online = results.iter().filter(|r| r.is_online()).count();
    println!("\nOnline: {}, Offline: {}", online, results.len() - online);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_url_building() {
        let node = NodeDescriptor::new("n1", "10.0.0.5").with_port(8080);
        assert_eq!(node.url("/api/v1/health"), "http://10.0.0.5:8080/api/v1/health");

        let v6 = NodeDescriptor::new("n2", "::1");
        assert_eq!(v6.url("api/v1/health"), "http://[::1]:3000/api/v1/health");
    }

    #[test]
    fn test_debug_redacts_credential() {
        let node = NodeDescriptor::new("n1", "host").with_credential("s3cr3t-token");
        let debug = format!("{:?}", node);
        assert!(!debug.contains("s3cr3t-token"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_status_transitions() {
        let online = NodeHealthResult::online("n1", 12);
        let offline = NodeHealthResult::offline("n1", NodeFailure::Timeout { after_ms: 5000 });

        assert_eq!(NodeStatus::Unknown.apply(&online), NodeStatus::Online);
        assert_eq!(NodeStatus::Unknown.apply(&offline), NodeStatus::Offline);
        assert_eq!(NodeStatus::Online.apply(&offline), NodeStatus::Offline);
        assert_eq!(NodeStatus::Offline.apply(&online), NodeStatus::Online);
    }

    #[test]
    fn test_result_serialization() {
        let offline = NodeHealthResult::offline("n2", NodeFailure::UnexpectedResponse { status: 503 });
        let json = serde_json::to_value(&offline).unwrap();
        assert_eq!(json["status"], "offline");
        assert_eq!(json["error"]["kind"], "unexpected_response");
        assert_eq!(json["error"]["status"], 503);
        assert!(json.get("latency_ms").is_none());

        let online = serde_json::to_value(NodeHealthResult::online("n1", 7)).unwrap();
        assert_eq!(online["latency_ms"], 7);
        assert!(online.get("error").is_none());
    }

    #[test]
    fn test_failure_transience() {
        assert!(NodeFailure::Timeout { after_ms: 1 }.is_transient());
        assert!(NodeFailure::UnexpectedResponse { status: 502 }.is_transient());
        assert!(!NodeFailure::UnexpectedResponse { status: 401 }.is_transient());
        assert!(!NodeFailure::InvalidPayload { reason: "eof".into() }.is_transient());
    }

    #[test]
    fn test_load_registry() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"id": "n1", "host": "10.0.0.1", "port": 8080, "api_key": "k1"}},
                {{"id": "n2", "name": "edge", "host": "edge.local", "status": "online"}}
            ]"#
        )
        .unwrap();

        let nodes = load_registry(file.path()).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].credential.as_deref(), Some("k1"));
        assert_eq!(nodes[0].status, NodeStatus::Unknown);
        assert_eq!(nodes[1].port, DEFAULT_NODE_PORT);
        assert_eq!(nodes[1].label(), "edge");
        assert_eq!(nodes[1].status, NodeStatus::Online);
    }

    #[test]
    fn test_load_registry_rejects_bad_entries() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"id": "", "host": "h"}}]"#).unwrap();
        assert!(matches!(
            load_registry(file.path()),
            Err(HostmonError::Config(_))
        ));

        let mut garbage = tempfile::NamedTempFile::new().unwrap();
        write!(garbage, "not json").unwrap();
        assert!(matches!(
            load_registry(garbage.path()),
            Err(HostmonError::Config(_))
        ));

        let missing = load_registry(Path::new("/nonexistent/hostmon/nodes.json"));
        assert!(matches!(missing, Err(HostmonError::Io { .. })));
    }
}
