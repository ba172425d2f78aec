//! Configuration settings for hostmon
//!
//! Defines CLI arguments, subcommands and the runtime `MonitorConfig`
//! derived from them.

use crate::nodes::{DEFAULT_HEALTH_PATH, DEFAULT_METRICS_PATH, DEFAULT_NODE_TIMEOUT};
use crate::perf::OptimizationArea;
use crate::system::DEFAULT_PROBE_TIMEOUT;
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// hostmon - host metrics, performance scoring and node health
#[derive(Parser, Debug, Clone)]
#[command(name = "hostmon")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Host resource sampling, performance analysis and node health probing")]
#[command(long_about = r#"
hostmon samples host resource usage, scores it, benchmarks the host and
polls registered nodes for liveness.

Examples:
  hostmon sample                          # One snapshot
  hostmon sample --count 5 --interval 2s  # Five snapshots, two seconds apart
  hostmon analyze --latency 120           # Score the host with a measured latency
  hostmon benchmark                       # Synthetic CPU/memory workload
  hostmon probe nodes.json                # Health of every registered node
  hostmon optimizations --area network    # Optimization hints
"#)]
pub struct CliArgs {
    /// Output format for reports
    #[arg(long, value_enum, default_value = "text", env = "HOSTMON_OUTPUT", global = true)]
    pub output_format: OutputFormat,

    /// Emit logs as JSON
    #[arg(long, env = "HOSTMON_LOG_JSON", global = true)]
    pub log_json: bool,

    /// Bound for each hardware lookup (e.g. 2s, 500ms)
    #[arg(long, default_value = "2s", value_name = "DURATION", env = "HOSTMON_PROBE_TIMEOUT", global = true)]
    pub probe_timeout: String,

    /// Skip GPU/temperature/OS lookups
    #[arg(long, global = true)]
    pub no_hardware_probe: bool,

    /// Bound for each node request
    #[arg(long, default_value = "5s", value_name = "DURATION", env = "HOSTMON_NODE_TIMEOUT", global = true)]
    pub node_timeout: String,

    /// Node health endpoint path
    #[arg(long, default_value = DEFAULT_HEALTH_PATH, env = "HOSTMON_HEALTH_PATH", global = true)]
    pub health_path: String,

    /// Node metrics endpoint path
    #[arg(long, default_value = DEFAULT_METRICS_PATH, env = "HOSTMON_METRICS_PATH", global = true)]
    pub metrics_path: String,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Take resource snapshots
    #[command(name = "sample")]
    Sample {
        /// Number of snapshots
        #[arg(short, long, default_value = "1")]
        count: usize,
        /// Delay between snapshots
        #[arg(short, long, default_value = "1s", value_name = "DURATION")]
        interval: String,
    },

    /// Score resource usage and list recommendations
    #[command(name = "analyze")]
    Analyze {
        /// CPU usage percent (sampled when omitted)
        #[arg(long)]
        cpu: Option<f64>,
        /// Memory usage percent (sampled when omitted)
        #[arg(long)]
        memory: Option<f64>,
        /// Measured latency in milliseconds
        #[arg(long, default_value = "0")]
        latency: f64,
        /// Sampling window used when usage is sampled
        #[arg(long, default_value = "1s", value_name = "DURATION")]
        interval: String,
    },

    /// Run the synthetic benchmark
    #[command(name = "benchmark")]
    Benchmark,

    /// Probe the health of registered nodes
    #[command(name = "probe")]
    Probe {
        /// JSON node registry
        #[arg(env = "HOSTMON_REGISTRY")]
        registry: PathBuf,
    },

    /// Fetch the metrics a node publishes
    #[command(name = "node-metrics")]
    NodeMetrics {
        /// JSON node registry
        #[arg(env = "HOSTMON_REGISTRY")]
        registry: PathBuf,
        /// Node id in the registry
        node: String,
    },

    /// List platform optimization hints
    #[command(name = "optimizations")]
    Optimizations {
        /// Only show hints for one area (cpu, memory, network, compute)
        #[arg(short, long)]
        area: Option<OptimizationArea>,
    },

    /// Show counters for the hostmon process itself
    #[command(name = "process")]
    Process,
}

/// Output format for reports
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON format
    Json,
}

/// Runtime configuration derived from CLI args
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Bound for each hardware lookup in milliseconds
    pub probe_timeout_ms: u64,
    /// Run hardware lookups at all
    pub hardware_probe: bool,
    /// Bound for each node request in milliseconds
    pub node_timeout_ms: u64,
    /// Node health endpoint
    pub health_path: String,
    /// Node metrics endpoint
    pub metrics_path: String,
    /// Report format
    pub output_format: OutputFormat,
    /// JSON log lines
    pub log_json: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT.as_millis() as u64,
            hardware_probe: true,
            node_timeout_ms: DEFAULT_NODE_TIMEOUT.as_millis() as u64,
            health_path: DEFAULT_HEALTH_PATH.to_string(),
            metrics_path: DEFAULT_METRICS_PATH.to_string(),
            output_format: OutputFormat::Text,
            log_json: false,
        }
    }
}

/// Parse a human-readable duration ("2s", "500ms", "1m")
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let duration = humantime::parse_duration(value.trim())
        .map_err(|e| format!("Invalid duration '{}': {}", value, e))?;
    if duration.is_zero() {
        return Err(format!("Duration '{}' must be greater than zero", value));
    }
    Ok(duration)
}

fn validate_endpoint(name: &str, path: &str) -> Result<String, String> {
    let path = path.trim();
    if !path.starts_with('/') || path.contains(char::is_whitespace) {
        return Err(format!("Invalid {} path '{}': must be absolute", name, path));
    }
    Ok(path.to_string())
}

impl MonitorConfig {
    /// Create config from CLI arguments
    pub fn from_cli(args: &CliArgs) -> Result<Self, String> {
        let probe_timeout = parse_duration(&args.probe_timeout)
            .map_err(|e| format!("Invalid probe timeout: {}", e))?;
        let node_timeout = parse_duration(&args.node_timeout)
            .map_err(|e| format!("Invalid node timeout: {}", e))?;

        Ok(Self {
            probe_timeout_ms: probe_timeout.as_millis() as u64,
            hardware_probe: !args.no_hardware_probe,
            node_timeout_ms: node_timeout.as_millis() as u64,
            health_path: validate_endpoint("health", &args.health_path)?,
            metrics_path: validate_endpoint("metrics", &args.metrics_path)?,
            output_format: args.output_format,
            log_json: args.log_json,
        })
    }

    /// Hardware lookup bound
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Node request bound
    pub fn node_timeout(&self) -> Duration {
        Duration::from_millis(self.node_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("hostmon").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration(" 500ms ").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_defaults_match_cli_defaults() {
        let args = parse(&["benchmark"]);
        let config = MonitorConfig::from_cli(&args).unwrap();
        assert_eq!(config, MonitorConfig::default());
        assert_eq!(config.probe_timeout(), Duration::from_secs(2));
        assert_eq!(config.node_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = parse(&[
            "probe",
            "nodes.json",
            "--node-timeout",
            "750ms",
            "--output-format",
            "json",
            "--no-hardware-probe",
        ]);
        let config = MonitorConfig::from_cli(&args).unwrap();

        assert_eq!(config.node_timeout_ms, 750);
        assert_eq!(config.output_format, OutputFormat::Json);
        assert!(!config.hardware_probe);
        match &args.command {
            Commands::Probe { registry } => assert_eq!(registry, &PathBuf::from("nodes.json")),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let args = parse(&["benchmark", "--probe-timeout", "never"]);
        assert!(MonitorConfig::from_cli(&args).is_err());

        let args = parse(&["benchmark", "--health-path", "api/health"]);
        assert!(MonitorConfig::from_cli(&args).is_err());
    }

    #[test]
    fn test_optimization_area_argument() {
        let args = parse(&["optimizations", "--area", "network"]);
        assert!(matches!(
            args.command,
            Commands::Optimizations { area: Some(OptimizationArea::Network) }
        ));

        assert!(CliArgs::try_parse_from(["hostmon", "optimizations", "--area", "disk"]).is_err());
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = MonitorConfig {
            output_format: OutputFormat::Json,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"output_format\":\"json\""));
        let back: MonitorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
