//! # hostmon - Host Metrics, Scoring and Node Health
//!
//! hostmon samples host resource usage, turns samples into recommendations
//! and a normalized score, benchmarks the host with a fixed synthetic
//! workload, and polls registered remote nodes for liveness and latency.
//!
//! ## Features
//!
//! - **Stateful Sampling**: CPU usage from per-core tick deltas, network rate
//!   integrated into a cumulative bandwidth counter
//! - **Best-effort Hardware Facts**: GPU, temperature, OS and kernel lookups,
//!   each bounded by its own timeout
//! - **Performance Analysis**: Rule-based recommendations and a 0-100 score
//! - **Synthetic Benchmark**: CPU and memory workload with impact classification
//! - **Node Health**: Concurrent probing with per-node failure isolation
//!
//! ## Quick Start
//!
//! ```no_run
//! use hostmon::system::{HardwareProbe, Sampler};
//!
//! let mut sampler = Sampler::host(HardwareProbe::host());
//! let sample = sampler.sample().unwrap();
//! sample.print_summary();
//! ```
//!
//! ## Analysis
//!
//! ```no_run
//! use hostmon::perf::{analyze, PerformanceMetrics};
//!
//! let metrics = PerformanceMetrics {
//!     cpu_usage: 95.0,
//!     memory_usage: 90.0,
//!     latency_ms: 150.0,
//!     network_throughput: 0.0,
//! };
//! let result = analyze(&metrics);
//! assert_eq!(result.score, 30);
//! ```
//!
//! ## Node Health
//!
//! ```no_run
//! use hostmon::config::MonitorConfig;
//! use hostmon::nodes::{NodeDescriptor, NodeProber};
//!
//! # async fn run() -> hostmon::Result<()> {
//! let prober = NodeProber::from_config(&MonitorConfig::default())?;
//! let nodes = vec![NodeDescriptor::new("edge-1", "10.0.0.7")];
//! for result in prober.check_all(&nodes).await {
//!     println!("{}: {:?}", result.node_id, result.status);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod nodes;
pub mod perf;
pub mod system;

// Re-export commonly used types
pub use config::MonitorConfig;
pub use error::{HostmonError, Result};
pub use system::{MetricsSample, Sampler, SharedSampler};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use hostmon::prelude::*;
    //! ```

    pub use crate::config::{MonitorConfig, OutputFormat};
    pub use crate::error::{HostmonError, Result};
    pub use crate::nodes::{NodeDescriptor, NodeHealthResult, NodeProber, NodeStatus};
    pub use crate::perf::{analyze, AnalysisResult, BenchmarkResult, Benchmarker, PerformanceMetrics};
    pub use crate::system::{HardwareProbe, MetricsSample, Probed, Sampler, SharedSampler};
}
