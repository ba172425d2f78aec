//! Synthetic benchmark
//!
//! Runs a fixed CPU and memory workload between two sampler snapshots and
//! classifies how much load it put on the host.

use crate::error::Result;
use crate::system::{CpuDelta, MemoryDelta, MetricsSample, ProcessCounters, SharedSampler};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::hint::black_box;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Floating-point iterations in the CPU workload
pub const CPU_ITERATIONS: u64 = 100_000;

/// Buffers allocated by the memory workload
pub const MEMORY_BUFFERS: usize = 10_000;

/// `f64` elements per buffer
pub const BUFFER_LEN: usize = 100;

/// Overall speed of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceClass {
    /// Under 100 ms
    Excellent,
    /// Under 500 ms
    Good,
    /// Under 1 s
    Fair,
    NeedsOptimization,
}

impl PerformanceClass {
    /// Classify a run duration
    pub fn from_duration_ms(duration_ms: f64) -> Self {
        if duration_ms < 100.0 {
            PerformanceClass::Excellent
        } else if duration_ms < 500.0 {
            PerformanceClass::Good
        } else if duration_ms < 1000.0 {
            PerformanceClass::Fair
        } else {
            PerformanceClass::NeedsOptimization
        }
    }
}

/// Impact of the run on a system-wide percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    Medium,
    High,
}

impl Impact {
    /// Classify a change in system CPU usage (percentage points)
    pub fn from_cpu_delta(delta: f64) -> Self {
        Self::classify(delta, 5.0, 15.0)
    }

    /// Classify a change in system memory usage (percentage points)
    pub fn from_memory_delta(delta: f64) -> Self {
        Self::classify(delta, 2.0, 5.0)
    }

    fn classify(delta: f64, low: f64, medium: f64) -> Self {
        let delta = delta.abs();
        if delta < low {
            Impact::Low
        } else if delta < medium {
            Impact::Medium
        } else {
            Impact::High
        }
    }
}

/// Qualitative view of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkSummary {
    pub performance: PerformanceClass,
    pub cpu_impact: Impact,
    pub memory_impact: Impact,
}

/// System-wide percentage before and after the run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SystemDelta {
    pub before: f64,
    pub after: f64,
    /// `after - before`
    pub delta: f64,
}

impl SystemDelta {
    fn between(before: f64, after: f64) -> Self {
        SystemDelta {
            before,
            after,
            delta: after - before,
        }
    }
}

/// Benchmark outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// When the run finished
    pub timestamp: DateTime<Utc>,
    /// Wall time of the run in milliseconds
    pub duration_ms: f64,
    /// `operation_count / (duration_ms / 1000)`
    pub throughput_ops_per_sec: f64,
    /// Workload iterations, constant across runs
    pub operation_count: u64,
    /// Process CPU time spent
    pub cpu_delta: CpuDelta,
    /// Process memory change
    pub memory_delta: MemoryDelta,
    /// System CPU usage around the run
    pub system_cpu: SystemDelta,
    /// System memory usage around the run
    pub system_memory: SystemDelta,
    /// Time taken by a single yield of the benchmark thread
    pub scheduler_latency_ms: f64,
    /// Network rate observed before the run (bytes/s)
    pub network_throughput: f64,
    pub summary: BenchmarkSummary,
}

impl BenchmarkResult {
    /// Print benchmark results to console
    pub fn print_summary(&self) {
        let signed_size = |bytes: i64| {
            let size = humansize::format_size(bytes.unsigned_abs(), humansize::BINARY);
            if bytes < 0 {
                format!("-{}", size)
            } else {
                size
            }
        };

        println!("=== Benchmark Results ===\n");
        println!(
            "Duration:    {}",
            humantime::format_duration(Duration::from_micros((self.duration_ms * 1000.0) as u64))
        );
        println!("Operations:  {}", self.operation_count);
        println!("Throughput:  {:.2} ops/sec", self.throughput_ops_per_sec);
        println!("Yield:       {:.3} ms", self.scheduler_latency_ms);

        println!("\nProcess CPU:");
        println!("  User:   {:.3}s", self.cpu_delta.user);
        println!("  System: {:.3}s", self.cpu_delta.sys);
        println!("  Total:  {:.3}s", self.cpu_delta.total());

        println!("\nProcess memory:");
        println!("  RSS:        {}", signed_size(self.memory_delta.rss));
        println!("  Heap total: {}", signed_size(self.memory_delta.heap_total));
        println!("  Heap used:  {}", signed_size(self.memory_delta.heap_used));

        println!("\nSystem:");
        println!(
            "  CPU:    {:.2}% -> {:.2}% ({:+.2}%)",
            self.system_cpu.before, self.system_cpu.after, self.system_cpu.delta
        );
        println!(
            "  Memory: {:.2}% -> {:.2}% ({:+.2}%)",
            self.system_memory.before, self.system_memory.after, self.system_memory.delta
        );

        println!("\n=== Summary ===");
        println!("Performance:   {:?}", self.summary.performance);
        println!("CPU impact:    {:?}", self.summary.cpu_impact);
        println!("Memory impact: {:?}", self.summary.memory_impact);
    }
}

/// Runs the synthetic workload against a shared sampler
#[derive(Clone)]
pub struct Benchmarker {
    sampler: SharedSampler,
}

impl Benchmarker {
    pub fn new(sampler: SharedSampler) -> Self {
        Benchmarker { sampler }
    }

    /// Run the benchmark; fails only if a sampler snapshot fails
    pub fn run_benchmark(&self) -> Result<BenchmarkResult> {
        info!(
            "Running benchmark: {} iterations, {} buffers",
            CPU_ITERATIONS, MEMORY_BUFFERS
        );

        let before: MetricsSample = self.sampler.sample()?;
        let process_before = ProcessCounters::capture();
        let start = Instant::now();

        black_box(cpu_workload(CPU_ITERATIONS));
        black_box(memory_workload(MEMORY_BUFFERS, BUFFER_LEN));
        let scheduler_latency = measure_yield();

        let duration = start.elapsed();
        let process_after = ProcessCounters::capture();
        let after = self.sampler.sample()?;

        let duration_ms = duration.as_secs_f64() * 1000.0;
        let system_cpu = SystemDelta::between(before.cpu_usage_pct, after.cpu_usage_pct);
        let system_memory = SystemDelta::between(before.memory_usage_pct, after.memory_usage_pct);

        debug!(
            duration_ms,
            cpu_delta = system_cpu.delta,
            memory_delta = system_memory.delta,
            "benchmark finished"
        );

        Ok(BenchmarkResult {
            timestamp: Utc::now(),
            duration_ms,
            throughput_ops_per_sec: throughput(CPU_ITERATIONS, duration_ms),
            operation_count: CPU_ITERATIONS,
            cpu_delta: process_after.cpu_since(&process_before),
            memory_delta: process_after.memory_since(&process_before),
            system_cpu,
            system_memory,
            scheduler_latency_ms: scheduler_latency.as_secs_f64() * 1000.0,
            network_throughput: before.network_throughput,
            summary: BenchmarkSummary {
                performance: PerformanceClass::from_duration_ms(duration_ms),
                cpu_impact: Impact::from_cpu_delta(system_cpu.delta),
                memory_impact: Impact::from_memory_delta(system_memory.delta),
            },
        })
    }
}

/// Operations per second; a zero-length run reports zero
fn throughput(operations: u64, duration_ms: f64) -> f64 {
    if duration_ms <= 0.0 {
        return 0.0;
    }
    operations as f64 / (duration_ms / 1000.0)
}

/// Hypotenuse and trig products over pseudo-random inputs
pub fn cpu_workload(iterations: u64) -> f64 {
    let mut rng = XorShift::new(0x9E37_79B9_7F4A_7C15);
    let mut acc = 0.0;
    for _ in 0..iterations {
        let a = rng.next_f64() * 100.0;
        let b = rng.next_f64() * 100.0;
        acc += (a * a + b * b).sqrt();
        acc += a.sin() * b.cos();
    }
    acc
}

/// Allocate `buffers` filled buffers and drop them
pub fn memory_workload(buffers: usize, len: usize) -> usize {
    let mut rng = XorShift::new(0xD1B5_4A32_D192_ED03);
    let held: Vec<Vec<f64>> = (0..buffers).map(|_| vec![rng.next_f64(); len]).collect();
    black_box(&held);
    held.iter().map(Vec::len).sum()
}

fn measure_yield() -> Duration {
    let start = Instant::now();
    std::thread::yield_now();
    start.elapsed()
}

/// Small deterministic generator for workload inputs
struct XorShift(u64);

impl XorShift {
    fn new(seed: u64) -> Self {
        XorShift(seed.max(1))
    }

    fn next_f64(&mut self) -> f64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::{HardwareProbe, Sampler, ScriptedSource};

    fn benchmarker() -> Benchmarker {
        let sampler = Sampler::new(Box::new(ScriptedSource::steady()), HardwareProbe::disabled());
        Benchmarker::new(SharedSampler::new(sampler))
    }

    #[test]
    fn test_run_benchmark() {
        let result = benchmarker().run_benchmark().unwrap();

        assert!(result.duration_ms >= 0.0);
        assert_eq!(result.operation_count, CPU_ITERATIONS);
        if result.duration_ms > 0.0 {
            let expected = result.operation_count as f64 / (result.duration_ms / 1000.0);
            assert!((result.throughput_ops_per_sec - expected).abs() < 1e-6 * expected);
        }
        assert!(result.cpu_delta.user >= 0.0);
        assert!(result.scheduler_latency_ms >= 0.0);
        // Steady source reports the same memory usage both times
        assert_eq!(result.system_memory.delta, 0.0);
        assert_eq!(result.summary.memory_impact, Impact::Low);
    }

    #[test]
    fn test_operation_count_is_constant() {
        let bench = benchmarker();
        let first = bench.run_benchmark().unwrap();
        let second = bench.run_benchmark().unwrap();
        assert_eq!(first.operation_count, second.operation_count);
    }

    #[test]
    fn test_failed_snapshot_fails_benchmark() {
        let mut source = ScriptedSource::steady();
        source.fail_memory = true;
        let sampler = Sampler::new(Box::new(source), HardwareProbe::disabled());
        let bench = Benchmarker::new(SharedSampler::new(sampler));

        assert!(bench.run_benchmark().is_err());
    }

    #[test]
    fn test_performance_classification() {
        assert_eq!(PerformanceClass::from_duration_ms(0.0), PerformanceClass::Excellent);
        assert_eq!(PerformanceClass::from_duration_ms(99.9), PerformanceClass::Excellent);
        assert_eq!(PerformanceClass::from_duration_ms(100.0), PerformanceClass::Good);
        assert_eq!(PerformanceClass::from_duration_ms(500.0), PerformanceClass::Fair);
        assert_eq!(
            PerformanceClass::from_duration_ms(1000.0),
            PerformanceClass::NeedsOptimization
        );
    }

    #[test]
    fn test_impact_classification() {
        assert_eq!(Impact::from_cpu_delta(-4.9), Impact::Low);
        assert_eq!(Impact::from_cpu_delta(5.0), Impact::Medium);
        assert_eq!(Impact::from_cpu_delta(-15.0), Impact::High);
        assert_eq!(Impact::from_memory_delta(1.5), Impact::Low);
        assert_eq!(Impact::from_memory_delta(-2.0), Impact::Medium);
        assert_eq!(Impact::from_memory_delta(5.0), Impact::High);
    }

    #[test]
    fn test_workloads() {
        assert!(cpu_workload(1_000).is_finite());
        assert_eq!(memory_workload(10, 100), 1_000);
        assert_eq!(throughput(100, 0.0), 0.0);
        assert_eq!(throughput(100, 500.0), 200.0);
    }

    #[test]
    fn test_serialized_summary() {
        let summary = BenchmarkSummary {
            performance: PerformanceClass::NeedsOptimization,
            cpu_impact: Impact::Medium,
            memory_impact: Impact::Low,
        };
        let json = serde_json::to_value(summary).unwrap();
        assert_eq!(json["performance"], "needs_optimization");
        assert_eq!(json["cpu_impact"], "medium");
    }
}
