//! hostmon CLI - host metrics, scoring and node health

use anyhow::{Context, Result};
use clap::Parser;
use hostmon::config::{parse_duration, CliArgs, Commands, MonitorConfig, OutputFormat};
use hostmon::error::HostmonError;
use hostmon::nodes::{load_registry, print_health_results, NodeProber};
use hostmon::perf::{
    analyze, optimizations, print_optimizations, Benchmarker, OptimizationArea, PerformanceMetrics,
};
use hostmon::system::{HardwareProbe, HostLookup, ProcessCounters, Sampler, SharedSampler};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    let started = Instant::now();

    // Parse CLI arguments
    let args = CliArgs::parse();

    init_logging(args.log_json);

    if let Err(e) = run(args, started) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(args: CliArgs, started: Instant) -> Result<()> {
    let config = MonitorConfig::from_cli(&args).map_err(HostmonError::Config)?;

    match &args.command {
        Commands::Sample { count, interval } => cmd_sample(&config, *count, interval),
        Commands::Analyze {
            cpu,
            memory,
            latency,
            interval,
        } => cmd_analyze(&config, *cpu, *memory, *latency, interval),
        Commands::Benchmark => cmd_benchmark(&config),
        Commands::Probe { registry } => cmd_probe(&config, registry),
        Commands::NodeMetrics { registry, node } => cmd_node_metrics(&config, registry, node),
        Commands::Optimizations { area } => cmd_optimizations(&config, *area),
        Commands::Process => cmd_process(&config, started),
    }
}

fn hardware_probe(config: &MonitorConfig) -> HardwareProbe {
    if config.hardware_probe {
        HardwareProbe::new(Arc::new(HostLookup), config.probe_timeout())
    } else {
        HardwareProbe::disabled()
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("Failed to create async runtime")
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).map_err(HostmonError::from)?);
    Ok(())
}

fn cmd_sample(config: &MonitorConfig, count: usize, interval: &str) -> Result<()> {
    let interval = parse_duration(interval).map_err(HostmonError::Config)?;
    let mut sampler = Sampler::host(hardware_probe(config));
    let mut samples = Vec::with_capacity(count);

    for i in 0..count {
        if i > 0 {
            std::thread::sleep(interval);
        }
        let sample = sampler.sample()?;
        if config.output_format == OutputFormat::Text {
            if i > 0 {
                println!();
            }
            sample.print_summary();
        }
        samples.push(sample);
    }

    match (config.output_format, samples.as_slice()) {
        (OutputFormat::Json, [single]) => print_json(single),
        (OutputFormat::Json, all) => print_json(all),
        (OutputFormat::Text, _) => Ok(()),
    }
}

fn cmd_analyze(
    config: &MonitorConfig,
    cpu: Option<f64>,
    memory: Option<f64>,
    latency: f64,
    interval: &str,
) -> Result<()> {
    let metrics = match (cpu, memory) {
        (Some(cpu_usage), Some(memory_usage)) => PerformanceMetrics {
            cpu_usage,
            memory_usage,
            latency_ms: latency,
            network_throughput: 0.0,
        },
        _ => {
            // CPU usage needs a baseline, so sample across the window
            let interval = parse_duration(interval).map_err(HostmonError::Config)?;
            let mut sampler = Sampler::host(HardwareProbe::disabled());
            sampler.sample()?;
            std::thread::sleep(interval);
            let sample = sampler.sample()?;

            let mut metrics = PerformanceMetrics::from(&sample).with_latency(latency);
            if let Some(cpu) = cpu {
                metrics.cpu_usage = cpu;
            }
            if let Some(memory) = memory {
                metrics.memory_usage = memory;
            }
            metrics
        }
    };

    let result = analyze(&metrics);
    match config.output_format {
        OutputFormat::Json => print_json(&result),
        OutputFormat::Text => {
            result.print_report();
            Ok(())
        }
    }
}

fn cmd_benchmark(config: &MonitorConfig) -> Result<()> {
    let sampler = SharedSampler::new(Sampler::host(hardware_probe(config)));
    let result = Benchmarker::new(sampler).run_benchmark()?;

    match config.output_format {
        OutputFormat::Json => print_json(&result),
        OutputFormat::Text => {
            result.print_summary();
            Ok(())
        }
    }
}

fn cmd_probe(config: &MonitorConfig, registry: &Path) -> Result<()> {
    let nodes = load_registry(registry)?;
    info!("Loaded {} node(s) from {}", nodes.len(), registry.display());

    let prober = NodeProber::from_config(config)?;
    let results = runtime()?.block_on(prober.check_all(&nodes));

    match config.output_format {
        OutputFormat::Json => print_json(&results),
        OutputFormat::Text => {
            print_health_results(&nodes, &results);
            Ok(())
        }
    }
}

fn cmd_node_metrics(config: &MonitorConfig, registry: &Path, node_id: &str) -> Result<()> {
    let nodes = load_registry(registry)?;
    let node = nodes
        .iter()
        .find(|n| n.id == node_id)
        .ok_or_else(|| HostmonError::config(format!("node '{}' not in {}", node_id, registry.display())))?;

    let prober = NodeProber::from_config(config)?;
    let metrics = runtime()?.block_on(prober.fetch_metrics(node))?;

    match config.output_format {
        OutputFormat::Json => print_json(&metrics),
        OutputFormat::Text => {
            println!("=== Metrics from {} ===\n", node.label());
            println!("{}", serde_json::to_string_pretty(&metrics.metrics).map_err(HostmonError::from)?);
            Ok(())
        }
    }
}

fn cmd_optimizations(config: &MonitorConfig, area: Option<OptimizationArea>) -> Result<()> {
    let entries = optimizations(area);

    match config.output_format {
        OutputFormat::Json => print_json(&entries),
        OutputFormat::Text => {
            print_optimizations(&entries);
            Ok(())
        }
    }
}

fn cmd_process(config: &MonitorConfig, started: Instant) -> Result<()> {
    let counters = ProcessCounters::capture();

    match config.output_format {
        OutputFormat::Json => print_json(&counters),
        OutputFormat::Text => {
            counters.print_summary(started);
            Ok(())
        }
    }
}
