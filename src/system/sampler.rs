//! Stateful metrics sampler
//!
//! A [`Sampler`] owns the CPU tick and network baselines carried between
//! calls. CPU usage is derived from tick deltas since the previous call and
//! the network counter integrates the current rate over elapsed time, so
//! both need exactly one writer: share a sampler through [`SharedSampler`].

use super::hardware::{HardwareInfo, HardwareProbe, Probed};
use super::resources::{CpuTicks, HostSource, MemoryStats, SysinfoSource};
use crate::error::{HostmonError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Storage estimate used when no filesystem reports sizes: total is this
/// multiple of physical memory
const ESTIMATED_STORAGE_MEMORY_FACTOR: u64 = 10;

/// Share of the estimated storage reported as used, in percent
const ESTIMATED_STORAGE_USED_PERCENT: u64 = 30;

/// Flags marking fields produced by a fallback rather than a measurement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EstimatedFields {
    /// Storage figures are a deterministic estimate
    pub storage: bool,
    /// Network rate is synthetic (no interface counters)
    pub network: bool,
}

/// Complete resource snapshot
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSample {
    /// CPU usage since the previous sample, percent
    pub cpu_usage_pct: f64,
    /// Physical memory in use, percent
    pub memory_usage_pct: f64,
    /// Total physical memory in bytes
    pub memory_total: u64,
    /// Memory in use in bytes
    pub memory_used: u64,
    /// Available memory in bytes
    pub memory_free: u64,
    /// Current network rate in bytes per second
    pub network_throughput: f64,
    /// Bytes integrated since the sampler started
    pub total_bandwidth_used: u64,
    /// First non-loopback interface
    pub network_interface: Option<String>,
    /// Storage in use in bytes
    pub storage_used: u64,
    /// Storage capacity in bytes
    pub storage_total: u64,
    /// Free storage in bytes
    pub storage_free: u64,
    /// Storage in use, percent
    pub storage_usage_pct: f64,
    /// One-minute load average
    pub load_average: f64,
    /// Seconds since boot
    pub uptime_seconds: u64,
    pub hostname: String,
    pub platform: String,
    pub arch: String,
    pub cpu_count: usize,
    pub cpu_model: String,
    /// CPU frequency in MHz
    pub cpu_speed: Option<u64>,
    pub gpu_name: Probed<String>,
    /// Degrees Celsius
    pub temperature: Probed<f32>,
    pub os_version: Probed<String>,
    pub kernel_version: Probed<String>,
    /// Which fields are estimates
    pub estimated: EstimatedFields,
    pub timestamp: DateTime<Utc>,
}

impl MetricsSample {
    /// Print sample summary to console
    pub fn print_summary(&self) {
        let size = |bytes: u64| humansize::format_size(bytes, humansize::BINARY);
        let estimate = |flag: bool| if flag { " (estimated)" } else { "" };

        println!("=== {} ({} {}) ===\n", self.hostname, self.platform, self.arch);

        println!("CPU:");
        println!("  Model: {}", self.cpu_model);
        println!("  Cores: {}", self.cpu_count);
        if let Some(mhz) = self.cpu_speed {
            println!("  Speed: {:.2} GHz", mhz as f64 / 1000.0);
        }
        println!("  Usage: {:.2}%", self.cpu_usage_pct);
        println!("  Load average: {:.2}", self.load_average);
        match &self.temperature {
            Probed::Known(celsius) => println!("  Temperature: {:.1}°C", celsius),
            Probed::Unknown => println!("  Temperature: {}", self.temperature),
        }

        println!("\nMemory:");
        println!("  Total: {}", size(self.memory_total));
        println!("  Used: {} ({:.2}%)", size(self.memory_used), self.memory_usage_pct);
        println!("  Free: {}", size(self.memory_free));

        println!("\nStorage{}:", estimate(self.estimated.storage));
        println!("  Total: {}", size(self.storage_total));
        println!("  Used: {} ({:.2}%)", size(self.storage_used), self.storage_usage_pct);
        println!("  Free: {}", size(self.storage_free));

        println!("\nNetwork{}:", estimate(self.estimated.network));
        println!(
            "  Interface: {}",
            self.network_interface.as_deref().unwrap_or("N/A")
        );
        println!("  Throughput: {}/s", size(self.network_throughput as u64));
        println!("  Total transferred: {}", size(self.total_bandwidth_used));

        println!("\nSystem:");
        println!("  GPU: {}", self.gpu_name);
        println!("  OS: {}", self.os_version);
        println!("  Kernel: {}", self.kernel_version);
        println!(
            "  Uptime: {}",
            humantime::format_duration(Duration::from_secs(self.uptime_seconds))
        );
        println!("  Sampled at: {}", self.timestamp.to_rfc3339());
    }
}

/// Per-core tick counters from the previous call
#[derive(Debug, Clone)]
struct CpuTickBaseline {
    cores: Vec<CpuTicks>,
}

/// Rate integration state
#[derive(Debug, Clone)]
struct NetworkBaseline {
    last_check: Instant,
    last_counter: Option<u64>,
    cumulative_bytes: f64,
}

/// Network figures for one sample
#[derive(Debug, Clone, Copy, PartialEq)]
struct NetworkReading {
    rate: f64,
    cumulative_bytes: f64,
    estimated: bool,
}

impl MetricsSample {
    fn with_hardware(mut self, probe: &HardwareProbe) -> Self {
        let hardware: HardwareInfo = probe.probe(&self.cpu_model, self.cpu_speed);
        self.cpu_model = hardware.cpu_name;
        self.cpu_speed = hardware.cpu_speed_mhz;
        self.gpu_name = hardware.gpu_name;
        self.temperature = hardware.temperature_celsius;
        self.os_version = hardware.os_version;
        self.kernel_version = hardware.kernel_version;
        self
    }
}

impl CpuTickBaseline {
    /// Replace the baseline with `current` and return usage since the old one
    fn advance(&mut self, current: Vec<CpuTicks>) -> f64 {
        let usage = if self.cores.len() == current.len() {
            cpu_usage_between(&self.cores, &current)
        } else {
            debug!(
                "CPU count changed from {} to {}, resetting tick baseline",
                self.cores.len(),
                current.len()
            );
            0.0
        };
        self.cores = current;
        usage
    }
}

impl NetworkBaseline {
    fn new(now: Instant, counter: Option<u64>) -> Self {
        NetworkBaseline {
            last_check: now,
            last_counter: counter,
            cumulative_bytes: 0.0,
        }
    }

    /// Integrate `rate * elapsed` into the cumulative counter
    fn advance(&mut self, now: Instant, counter: Option<u64>) -> NetworkReading {
        let elapsed = now.saturating_duration_since(self.last_check).as_secs_f64();
        let estimated = counter.is_none();

        if elapsed <= 0.0 {
            return NetworkReading {
                rate: 0.0,
                cumulative_bytes: self.cumulative_bytes,
                estimated,
            };
        }

        let rate = match (counter, self.last_counter) {
            (Some(current), Some(previous)) => current.saturating_sub(previous) as f64 / elapsed,
            // Synthetic estimate when no counter is available
            _ => 0.0,
        };

        self.cumulative_bytes += rate * elapsed;
        // A gap keeps the last real reading, the next delta spans the gap
        if counter.is_some() {
            self.last_check = now;
            self.last_counter = counter;
        }

        NetworkReading {
            rate,
            cumulative_bytes: self.cumulative_bytes,
            estimated,
        }
    }
}

/// Utilization across all cores between two tick snapshots, clamped to [0, 100]
pub fn cpu_usage_between(previous: &[CpuTicks], current: &[CpuTicks]) -> f64 {
    let (total, idle) = previous
        .iter()
        .zip(current)
        .fold((0u64, 0u64), |(total, idle), (prev, curr)| {
            (
                total + curr.total().saturating_sub(prev.total()),
                idle + curr.idle_total().saturating_sub(prev.idle_total()),
            )
        });

    if total == 0 {
        return 0.0;
    }

    let usage = 100.0 - 100.0 * idle as f64 / total as f64;
    usage.clamp(0.0, 100.0)
}

/// Share of `part` in `whole` as a percentage in [0, 100]
fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 100.0).clamp(0.0, 100.0)
}

/// Storage figures for one sample
struct StorageReading {
    used: u64,
    total: u64,
    free: u64,
    estimated: bool,
}

impl StorageReading {
    fn estimate(memory: &MemoryStats) -> Self {
        let total = memory.total.saturating_mul(ESTIMATED_STORAGE_MEMORY_FACTOR);
        let used = (total as u128 * ESTIMATED_STORAGE_USED_PERCENT as u128 / 100) as u64;
        StorageReading {
            used,
            total,
            free: total - used,
            estimated: true,
        }
    }
}

/// Resource sampler owning the delta baselines
pub struct Sampler {
    source: Box<dyn HostSource>,
    probe: HardwareProbe,
    cpu: Option<CpuTickBaseline>,
    network: Option<NetworkBaseline>,
}

impl Sampler {
    /// Create a sampler over an explicit source and probe
    pub fn new(source: Box<dyn HostSource>, probe: HardwareProbe) -> Self {
        Sampler {
            source,
            probe,
            cpu: None,
            network: None,
        }
    }

    /// Sampler over the local host
    pub fn host(probe: HardwareProbe) -> Self {
        Self::new(Box::new(SysinfoSource::new()), probe)
    }

    /// Drop both baselines; the next sample starts cold
    pub fn reset(&mut self) {
        self.cpu = None;
        self.network = None;
    }

    /// Take a sample using the monotonic clock
    pub fn sample(&mut self) -> Result<MetricsSample> {
        self.sample_at(Instant::now())
    }

    /// Take a sample as of `now`.
    ///
    /// All OS queries happen before any baseline is touched, so a failed
    /// call leaves the state as it was.
    pub fn sample_at(&mut self, now: Instant) -> Result<MetricsSample> {
        let sample = self.measure_at(now)?;
        Ok(sample.with_hardware(&self.probe))
    }

    /// Counters and baselines only; hardware fields are left unknown
    fn measure_at(&mut self, now: Instant) -> Result<MetricsSample> {
        let ticks = self.source.cpu_ticks()?;
        let memory = self.source.memory()?;
        let network = self.source.network();
        let disks = self.source.storage();
        let facts = self.source.host_facts();

        if memory.total == 0 {
            return Err(HostmonError::sampling("reported zero physical memory"));
        }

        let cpu_usage_pct = match self.cpu.as_mut() {
            Some(baseline) => baseline.advance(ticks),
            None => {
                self.cpu = Some(CpuTickBaseline { cores: ticks });
                0.0
            }
        };

        let counter = network.as_ref().map(|n| n.total_bytes);
        let reading = match self.network.as_mut() {
            Some(baseline) => baseline.advance(now, counter),
            None => {
                self.network = Some(NetworkBaseline::new(now, counter));
                NetworkReading {
                    rate: 0.0,
                    cumulative_bytes: 0.0,
                    estimated: counter.is_none(),
                }
            }
        };

        let storage = match disks {
            Some(disks) => StorageReading {
                used: disks.total.saturating_sub(disks.available),
                total: disks.total,
                free: disks.available,
                estimated: false,
            },
            None => StorageReading::estimate(&memory),
        };

        debug!(
            cpu = cpu_usage_pct,
            rate = reading.rate,
            storage_estimated = storage.estimated,
            "sample taken"
        );

        Ok(MetricsSample {
            cpu_usage_pct,
            memory_usage_pct: percent(memory.used, memory.total),
            memory_total: memory.total,
            memory_used: memory.used,
            memory_free: memory.free,
            network_throughput: reading.rate,
            total_bandwidth_used: reading.cumulative_bytes as u64,
            network_interface: network.and_then(|n| n.primary_interface),
            storage_used: storage.used,
            storage_total: storage.total,
            storage_free: storage.free,
            storage_usage_pct: percent(storage.used, storage.total),
            load_average: self.source.load_average(),
            uptime_seconds: self.source.uptime_seconds(),
            hostname: facts.hostname,
            platform: facts.platform,
            arch: facts.arch,
            cpu_count: facts.cpu_count,
            cpu_model: facts.cpu_model,
            cpu_speed: facts.cpu_speed_mhz,
            gpu_name: Probed::Unknown,
            temperature: Probed::Unknown,
            os_version: Probed::Unknown,
            kernel_version: Probed::Unknown,
            estimated: EstimatedFields {
                storage: storage.estimated,
                network: reading.estimated,
            },
            timestamp: Utc::now(),
        })
    }
}

/// Sampler shared between callers.
///
/// Baseline updates are serialized; hardware lookups run outside the lock.
#[derive(Clone)]
pub struct SharedSampler {
    inner: Arc<Mutex<Sampler>>,
    probe: HardwareProbe,
}

impl SharedSampler {
    /// Wrap a sampler
    pub fn new(sampler: Sampler) -> Self {
        SharedSampler {
            probe: sampler.probe.clone(),
            inner: Arc::new(Mutex::new(sampler)),
        }
    }

    /// Take a sample, waiting for any in-flight baseline update to finish
    pub fn sample(&self) -> Result<MetricsSample> {
        let sample = self.lock().measure_at(Instant::now())?;
        Ok(sample.with_hardware(&self.probe))
    }

    /// Reset the baselines
    pub fn reset(&self) -> Result<()> {
        self.lock().reset();
        Ok(())
    }

    /// A caller that panicked mid-update may have left a half-written
    /// baseline, so a poisoned sampler restarts cold.
    fn lock(&self) -> MutexGuard<'_, Sampler> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("sampler lock poisoned by a panicked caller, resetting baselines");
            let mut sampler = poisoned.into_inner();
            sampler.reset();
            self.inner.clear_poison();
            sampler
        })
    }
}
