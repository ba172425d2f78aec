//! Remote node health probing
//!
//! Node descriptors come from a registry owned by the caller. The prober
//! polls them concurrently over a pluggable HTTP transport and returns one
//! result per node.

mod models;
mod prober;
mod transport;

pub use models::{
    load_registry, print_health_results, HealthStatus, NodeDescriptor, NodeFailure,
    NodeHealthResult, NodeMetrics, NodeStatus, DEFAULT_NODE_PORT,
};
pub use prober::{NodeProber, DEFAULT_HEALTH_PATH, DEFAULT_METRICS_PATH, DEFAULT_NODE_TIMEOUT};
pub use transport::{HealthTransport, ReqwestTransport, TransportResponse};
