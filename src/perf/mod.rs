//! Performance analysis, benchmarking and optimization hints

mod analyzer;
mod benchmark;
mod optimizations;

pub use analyzer::{
    analyze, score, AnalysisResult, PerformanceMetrics, Recommendation, RecommendationKind,
    Severity,
};
pub use benchmark::{
    cpu_workload, memory_workload, BenchmarkResult, BenchmarkSummary, Benchmarker, Impact,
    PerformanceClass, SystemDelta, BUFFER_LEN, CPU_ITERATIONS, MEMORY_BUFFERS,
};
pub use optimizations::{optimizations, print_optimizations, Level, Optimization, OptimizationArea};
