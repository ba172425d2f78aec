//! Concurrent node health prober
//!
//! Each node gets its own task; results are collected in input order once
//! every task has settled. Probe failures never escape as errors: they are
//! recorded in the node's `NodeHealthResult`.

use super::models::{NodeDescriptor, NodeFailure, NodeHealthResult, NodeMetrics};
use super::transport::{HealthTransport, ReqwestTransport, TransportResponse};
use crate::config::MonitorConfig;
use crate::error::{HostmonError, Result};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default bound for a single node request
pub const DEFAULT_NODE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default health endpoint
pub const DEFAULT_HEALTH_PATH: &str = "/api/v1/health";

/// Default metrics endpoint
pub const DEFAULT_METRICS_PATH: &str = "/api/v1/system/metrics";

/// Health prober for registered nodes
#[derive(Clone)]
pub struct NodeProber {
    transport: Arc<dyn HealthTransport>,
    timeout: Duration,
    health_path: String,
    metrics_path: String,
}

impl NodeProber {
    /// Create a prober over `transport` with the default endpoints
    pub fn new(transport: Arc<dyn HealthTransport>, timeout: Duration) -> Self {
        NodeProber {
            transport,
            timeout,
            health_path: DEFAULT_HEALTH_PATH.to_string(),
            metrics_path: DEFAULT_METRICS_PATH.to_string(),
        }
    }

    /// Prober using `reqwest` and the configured bound and endpoints
    pub fn from_config(config: &MonitorConfig) -> Result<Self> {
        let transport = ReqwestTransport::new()?;
        Ok(Self::new(Arc::new(transport), config.node_timeout())
            .with_paths(&config.health_path, &config.metrics_path))
    }

    /// Override the health and metrics endpoints
    pub fn with_paths(mut self, health_path: &str, metrics_path: &str) -> Self {
        self.health_path = health_path.to_string();
        self.metrics_path = metrics_path.to_string();
        self
    }

    /// Per-request bound
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET `path` on `node`, bounded by the prober timeout
    async fn request(
        &self,
        node: &NodeDescriptor,
        path: &str,
    ) -> std::result::Result<TransportResponse, NodeFailure> {
        let url = node.url(path);
        debug!("GET {}", url);

        let call = self
            .transport
            .get(&url, node.credential.as_deref(), self.timeout);

        match tokio::time::timeout(self.timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => Err(NodeFailure::Timeout {
                after_ms: self.timeout.as_millis() as u64,
            }),
        }
    }

    /// Probe one node. Never fails; problems are recorded as offline.
    pub async fn check_one(&self, node: &NodeDescriptor) -> NodeHealthResult {
        let start = Instant::now();

        let outcome = match self.request(node, &self.health_path).await {
            Ok(response) if response.status == 200 => Ok(start.elapsed()),
            Ok(response) => Err(NodeFailure::UnexpectedResponse {
                status: response.status,
            }),
            Err(failure) => Err(failure),
        };

        match outcome {
            Ok(latency) => {
                let latency_ms = latency.as_millis() as u64;
                debug!("Node {} online ({} ms)", node.label(), latency_ms);
                NodeHealthResult::online(&node.id, latency_ms)
            }
            Err(failure) => {
                warn!("Node {} offline: {}", node.label(), failure);
                NodeHealthResult::offline(&node.id, failure)
            }
        }
    }

    /// Probe all nodes concurrently.
    ///
    /// The result has one entry per input node, in input order. A probe
    /// task that dies is recorded as offline in its slot.
    pub async fn check_all(&self, nodes: &[NodeDescriptor]) -> Vec<NodeHealthResult> {
        info!("Probing {} node(s)", nodes.len());

        let handles: Vec<_> = nodes
            .iter()
            .cloned()
            .map(|node| {
                let prober = self.clone();
                tokio::spawn(async move { prober.check_one(&node).await })
            })
            .collect();

        let settled = join_all(handles).await;

        let results: Vec<NodeHealthResult> = settled
            .into_iter()
            .zip(nodes)
            .map(|(joined, node)| match joined {
                Ok(result) => result,
                Err(e) => {
                    warn!("Probe task for node {} failed: {}", node.label(), e);
                    NodeHealthResult::offline(
                        &node.id,
                        NodeFailure::Unreachable {
                            reason: format!("probe task failed: {}", e),
                        },
                    )
                }
            })
            .collect();

        let online = results.iter().filter(|r| r.is_online()).count();
        info!("{} of {} node(s) online", online, results.len());
        results
    }

    /// Fetch the metrics payload published by `node`
    pub async fn fetch_metrics(&self, node: &NodeDescriptor) -> Result<NodeMetrics> {
        let response = self
            .request(node, &self.metrics_path)
            .await
            .map_err(|failure| HostmonError::node(&node.id, failure))?;

        if response.status != 200 {
            return Err(HostmonError::node(
                &node.id,
                NodeFailure::UnexpectedResponse {
                    status: response.status,
                },
            ));
        }

        let payload: serde_json::Value = serde_json::from_slice(&response.body).map_err(|e| {
            HostmonError::node(
                &node.id,
                NodeFailure::InvalidPayload {
                    reason: e.to_string(),
                },
            )
        })?;

        let metrics = match payload {
            serde_json::Value::Object(mut map) if map.contains_key("data") => {
                map.remove("data").unwrap_or(serde_json::Value::Null)
            }
            other => other,
        };

        Ok(NodeMetrics {
            node_id: node.id.clone(),
            node_name: node.name.clone(),
            metrics,
            timestamp: Utc::now(),
        })
    }
}

impl std::fmt::Debug for NodeProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeProber")
            .field("timeout", &self.timeout)
            .field("health_path", &self.health_path)
            .field("metrics_path", &self.metrics_path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::HealthStatus;
    use async_trait::async_trait;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    const OK_RESPONSE: &str = "HTTP/1.1 200 OK\r\nContent-Length: 15\r\nConnection: close\r\n\r\n{\"status\":\"ok\"}";
    const NOT_FOUND: &str = "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

    /// Serve a canned response to every connection, reporting each request
    async fn serve(response: &'static str) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 8192];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    let _ = tx.send(String::from_utf8_lossy(&buf[..n]).to_string());
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        (addr, rx)
    }

    /// Accept connections and never answer
    async fn serve_silently() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        addr
    }

    /// A port with nothing listening
    async fn closed_port() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    }

    fn node_at(id: &str, addr: SocketAddr) -> NodeDescriptor {
        NodeDescriptor::new(id, addr.ip().to_string()).with_port(addr.port())
    }

    fn prober(timeout: Duration) -> NodeProber {
        NodeProber::new(Arc::new(ReqwestTransport::new().unwrap()), timeout)
    }

    #[tokio::test]
    async fn test_online_node_with_bearer() {
        let (addr, mut requests) = serve(OK_RESPONSE).await;
        let node = node_at("n1", addr).with_credential("token-123");

        let result = prober(Duration::from_secs(2)).check_one(&node).await;
        assert_eq!(result.status, HealthStatus::Online);
        assert!(result.latency_ms.is_some());
        assert!(result.error.is_none());

        let request = requests.recv().await.unwrap();
        assert!(request.starts_with("GET /api/v1/health "));
        assert!(request.to_lowercase().contains("authorization: bearer token-123"));
    }

    #[tokio::test]
    async fn test_unexpected_status_is_offline() {
        let (addr, _requests) = serve(NOT_FOUND).await;
        let result = prober(Duration::from_secs(2)).check_one(&node_at("n1", addr)).await;

        assert_eq!(result.status, HealthStatus::Offline);
        assert_eq!(result.latency_ms, None);
        assert_eq!(result.error, Some(NodeFailure::UnexpectedResponse { status: 404 }));
    }

    #[tokio::test]
    async fn test_refused_connection_is_unreachable() {
        let addr = closed_port().await;
        let result = prober(Duration::from_secs(2)).check_one(&node_at("n1", addr)).await;

        assert_eq!(result.status, HealthStatus::Offline);
        assert!(matches!(result.error, Some(NodeFailure::Unreachable { .. })));
    }

    #[tokio::test]
    async fn test_check_all_isolates_slow_node() {
        let (fast, _r1) = serve(OK_RESPONSE).await;
        let slow = serve_silently().await;
        let (fast_too, _r3) = serve(OK_RESPONSE).await;

        let nodes = vec![
            node_at("n1", fast),
            node_at("n2", slow),
            node_at("n3", fast_too),
        ];

        let timeout = Duration::from_millis(300);
        let start = Instant::now();
        let results = prober(timeout).check_all(&nodes).await;
        let elapsed = start.elapsed();

        assert_eq!(results.len(), 3);
        let ids: Vec<_> = results.iter().map(|r| r.node_id.as_str()).collect();
        assert_eq!(ids, vec!["n1", "n2", "n3"]);

        assert!(results[0].is_online());
        assert!(!results[1].is_online());
        assert!(matches!(results[1].error, Some(NodeFailure::Timeout { .. })));
        assert!(results[2].is_online());
        assert!(elapsed < Duration::from_secs(2), "check_all took {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_check_all_empty() {
        let results = prober(Duration::from_millis(100)).check_all(&[]).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_metrics_unwraps_data() {
        const METRICS: &str = "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 34\r\nConnection: close\r\n\r\n{\"success\":true,\"data\":{\"cpu\":42}}";
        let (addr, mut requests) = serve(METRICS).await;
        let node = node_at("n1", addr);

        let metrics = prober(Duration::from_secs(2)).fetch_metrics(&node).await.unwrap();
        assert_eq!(metrics.node_id, "n1");
        assert_eq!(metrics.metrics["cpu"], 42);

        let request = requests.recv().await.unwrap();
        assert!(request.starts_with("GET /api/v1/system/metrics "));
    }

    #[tokio::test]
    async fn test_fetch_metrics_failure_is_error() {
        let (addr, _requests) = serve(NOT_FOUND).await;
        let err = prober(Duration::from_secs(2))
            .fetch_metrics(&node_at("n1", addr))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            HostmonError::Node {
                failure: NodeFailure::UnexpectedResponse { status: 404 },
                ..
            }
        ));
    }

    /// Transport that panics for one host and answers 200 otherwise
    struct PanickingTransport;

    #[async_trait]
    impl HealthTransport for PanickingTransport {
        async fn get(
            &self,
            url: &str,
            _bearer: Option<&str>,
            _timeout: Duration,
        ) -> std::result::Result<TransportResponse, NodeFailure> {
            if url.contains("boom") {
                panic!("transport exploded");
            }
            Ok(TransportResponse {
                status: 200,
                body: Vec::new(),
            })
        }
    }

    #[test]
    fn test_panicking_probe_recorded_in_place() {
        let prober = NodeProber::new(Arc::new(PanickingTransport), Duration::from_secs(1));
        let nodes = vec![
            NodeDescriptor::new("a", "alpha"),
            NodeDescriptor::new("b", "boom"),
            NodeDescriptor::new("c", "gamma"),
        ];

        let results = tokio_test::block_on(prober.check_all(&nodes));
        assert_eq!(results.len(), 3);
        assert!(results[0].is_online());
        assert_eq!(results[1].node_id, "b");
        assert!(matches!(results[1].error, Some(NodeFailure::Unreachable { .. })));
        assert!(results[2].is_online());
    }
}
