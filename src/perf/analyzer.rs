//! Performance analysis
//!
//! Maps a metrics snapshot to an ordered list of recommendations and a
//! normalized score. Analysis is pure: the same metrics always produce the
//! same result apart from the timestamp.

use crate::system::MetricsSample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// CPU usage above which a scale-out recommendation is made
const CPU_HIGH_PCT: f64 = 80.0;
/// CPU usage below which a right-sizing recommendation is made
const CPU_LOW_PCT: f64 = 20.0;
/// CPU usage above which a smaller penalty applies
const CPU_ELEVATED_PCT: f64 = 60.0;
const MEMORY_HIGH_PCT: f64 = 85.0;
const MEMORY_ELEVATED_PCT: f64 = 70.0;
const LATENCY_HIGH_MS: f64 = 100.0;
const LATENCY_ELEVATED_MS: f64 = 50.0;

/// Inputs to the analyzer
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// CPU usage in percent
    pub cpu_usage: f64,
    /// Memory usage in percent
    pub memory_usage: f64,
    /// Request latency in milliseconds
    pub latency_ms: f64,
    /// Network rate in bytes per second
    pub network_throughput: f64,
}

impl PerformanceMetrics {
    /// Replace the latency with a measured value
    pub fn with_latency(mut self, latency_ms: f64) -> Self {
        self.latency_ms = latency_ms;
        self
    }
}

impl From<&MetricsSample> for PerformanceMetrics {
    fn from(sample: &MetricsSample) -> Self {
        PerformanceMetrics {
            cpu_usage: sample.cpu_usage_pct,
            memory_usage: sample.memory_usage_pct,
            latency_ms: 0.0,
            network_throughput: sample.network_throughput,
        }
    }
}

/// Resource a recommendation is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationKind {
    Cpu,
    Memory,
    Latency,
}

/// Severity of a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Needs attention
    High,
    /// Opportunity rather than a problem
    Low,
}

/// A single recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Resource concerned
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
    pub severity: Severity,
    /// What was observed
    pub message: String,
    /// What to do about it
    pub suggestion: String,
}

impl Recommendation {
    fn new(kind: RecommendationKind, severity: Severity, message: &str, suggestion: &str) -> Self {
        Recommendation {
            kind,
            severity,
            message: message.to_string(),
            suggestion: suggestion.to_string(),
        }
    }
}

/// Analyzer output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// When the analysis ran
    pub timestamp: DateTime<Utc>,
    /// Metrics that were analyzed
    pub metrics: PerformanceMetrics,
    /// Recommendations in rule order (cpu, memory, latency)
    pub recommendations: Vec<Recommendation>,
    /// Score in [0, 100]
    pub score: u8,
}

/// Analyze metrics and produce recommendations and a score
pub fn analyze(metrics: &PerformanceMetrics) -> AnalysisResult {
    let mut recommendations = Vec::new();

    if metrics.cpu_usage > CPU_HIGH_PCT {
        recommendations.push(Recommendation::new(
            RecommendationKind::Cpu,
            Severity::High,
            "High CPU usage detected. Consider scaling horizontally or optimizing workloads.",
            "Review CPU-intensive processes and consider load balancing",
        ));
    } else if metrics.cpu_usage < CPU_LOW_PCT {
        recommendations.push(Recommendation::new(
            RecommendationKind::Cpu,
            Severity::Low,
            "Low CPU utilization. Consider right-sizing resources for cost optimization.",
            "Evaluate if smaller instance types would be sufficient",
        ));
    }

    if metrics.memory_usage > MEMORY_HIGH_PCT {
        recommendations.push(Recommendation::new(
            RecommendationKind::Memory,
            Severity::High,
            "High memory usage detected. Monitor for potential memory leaks.",
            "Review memory allocation patterns and consider increasing memory limits",
        ));
    }

    if metrics.latency_ms > LATENCY_HIGH_MS {
        recommendations.push(Recommendation::new(
            RecommendationKind::Latency,
            Severity::High,
            "High latency detected. Investigate network or processing bottlenecks.",
            "Review network configuration and database query performance",
        ));
    }

    AnalysisResult {
        timestamp: Utc::now(),
        metrics: *metrics,
        recommendations,
        score: score(metrics),
    }
}

/// Performance score in [0, 100]
pub fn score(metrics: &PerformanceMetrics) -> u8 {
    let mut score: i32 = 100;

    if metrics.cpu_usage > CPU_HIGH_PCT {
        score -= 20;
    } else if metrics.cpu_usage > CPU_ELEVATED_PCT {
        score -= 10;
    }

    if metrics.memory_usage > MEMORY_HIGH_PCT {
        score -= 20;
    } else if metrics.memory_usage > MEMORY_ELEVATED_PCT {
        score -= 10;
    }

    if metrics.latency_ms > LATENCY_HIGH_MS {
        score -= 30;
    } else if metrics.latency_ms > LATENCY_ELEVATED_MS {
        score -= 15;
    }

    score.clamp(0, 100) as u8
}

impl AnalysisResult {
    /// Print the analysis to console
    pub fn print_report(&self) {
        println!("=== Performance Analysis ===\n");
        println!("CPU usage:    {:.2}%", self.metrics.cpu_usage);
        println!("Memory usage: {:.2}%", self.metrics.memory_usage);
        println!("Latency:      {:.0} ms", self.metrics.latency_ms);
        println!(
            "Network:      {}/s",
            humansize::format_size(self.metrics.network_throughput.max(0.0) as u64, humansize::BINARY)
        );
        println!("\nScore: {}/100\n", self.score);

        if self.recommendations.is_empty() {
            println!("No recommendations: resource usage is within normal ranges.");
            return;
        }

        for rec in &self.recommendations {
            let icon = match rec.severity {
                Severity::High => "[!!]",
                Severity::Low => "[~]",
            };
            println!("{} {:?}: {}", icon, rec.kind, rec.message);
            println!("   Suggestion: {}", rec.suggestion);
            println!();
        }

        let high = self
            .recommendations
            .iter()
            .filter(|r| r.severity == Severity::High)
            .count();
        println!("=== Summary ===");
        println!("High: {}, Low: {}", high, self.recommendations.len() - high);
    }
}
