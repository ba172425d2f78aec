//! OS facts source
//!
//! Raw counters the sampler turns into a `MetricsSample`: per-core CPU
//! ticks, memory totals, interface byte counters, disk totals, load and
//! uptime. The default implementation reads them through `sysinfo`, with
//! per-core tick counters from `/proc/stat` on Linux.

use crate::error::{HostmonError, Result};
use serde::{Deserialize, Serialize};
use sysinfo::{Disks, Networks, System};

/// Cumulative tick counters for one logical CPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CpuTicks {
    /// Time spent in user mode
    pub user: u64,
    /// Time spent in user mode with low priority
    pub nice: u64,
    /// Time spent in kernel mode
    pub sys: u64,
    /// Idle time
    pub idle: u64,
    /// Time servicing interrupts
    pub irq: u64,
}

impl CpuTicks {
    /// Sum of all tracked states
    pub fn total(&self) -> u64 {
        self.user + self.nice + self.sys + self.idle + self.irq
    }

    /// Ticks not spent on work (idle + irq)
    pub fn idle_total(&self) -> u64 {
        self.idle + self.irq
    }
}

/// Physical memory totals in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Total physical memory
    pub total: u64,
    /// Memory in use
    pub used: u64,
    /// Memory available for new allocations
    pub free: u64,
}

/// Cumulative interface byte counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCounters {
    /// Received + transmitted bytes across non-loopback interfaces
    pub total_bytes: u64,
    /// First non-loopback interface, if any
    pub primary_interface: Option<String>,
}

/// Filesystem totals in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskTotals {
    /// Total capacity
    pub total: u64,
    /// Free capacity
    pub available: u64,
}

/// Descriptive host facts that are passed through untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostFacts {
    /// Host name
    pub hostname: String,
    /// Operating system family (linux, macos, windows, ...)
    pub platform: String,
    /// CPU architecture
    pub arch: String,
    /// Number of logical CPUs
    pub cpu_count: usize,
    /// CPU model string
    pub cpu_model: String,
    /// CPU frequency in MHz (if available)
    pub cpu_speed_mhz: Option<u64>,
}

/// Capability for querying raw OS counters.
///
/// `cpu_ticks` and `memory` are the only fallible queries: without them a
/// sample cannot be produced. The others degrade to `None` and the sampler
/// substitutes flagged estimates.
pub trait HostSource: Send {
    /// Per-core tick counters; empty when the platform has none
    fn cpu_ticks(&mut self) -> Result<Vec<CpuTicks>>;

    /// Physical memory totals
    fn memory(&mut self) -> Result<MemoryStats>;

    /// Interface byte counters, `None` when no counters are available
    fn network(&mut self) -> Option<NetworkCounters>;

    /// Filesystem totals, `None` when no filesystem reports sizes
    fn storage(&mut self) -> Option<DiskTotals>;

    /// One-minute load average
    fn load_average(&self) -> f64;

    /// Seconds since boot
    fn uptime_seconds(&self) -> u64;

    /// Host identity and CPU description
    fn host_facts(&self) -> HostFacts;
}

/// `HostSource` backed by `sysinfo`
pub struct SysinfoSource {
    system: System,
    networks: Networks,
    disks: Disks,
}

impl SysinfoSource {
    /// Create a source with refreshed CPU, memory, network and disk lists
    pub fn new() -> Self {
        SysinfoSource {
            system: System::new_all(),
            networks: Networks::new_with_refreshed_list(),
            disks: Disks::new_with_refreshed_list(),
        }
    }

    #[cfg(target_os = "linux")]
    fn read_cpu_ticks() -> Result<Vec<CpuTicks>> {
        use procfs::{CurrentSI, KernelStats};

        let stats = KernelStats::current()
            .map_err(|e| HostmonError::sampling(format!("reading /proc/stat: {}", e)))?;

        Ok(stats
            .cpu_time
            .iter()
            .map(|cpu| CpuTicks {
                user: cpu.user,
                nice: cpu.nice,
                sys: cpu.system,
                idle: cpu.idle,
                irq: cpu.irq.unwrap_or(0),
            })
            .collect())
    }

    #[cfg(not(target_os = "linux"))]
    fn read_cpu_ticks() -> Result<Vec<CpuTicks>> {
        // No tick counters exposed here; usage stays at the cold-start value
        Ok(Vec::new())
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl HostSource for SysinfoSource {
    fn cpu_ticks(&mut self) -> Result<Vec<CpuTicks>> {
        Self::read_cpu_ticks()
    }

    fn memory(&mut self) -> Result<MemoryStats> {
        self.system.refresh_memory();

        let total = self.system.total_memory();
        if total == 0 {
            return Err(HostmonError::sampling("physical memory totals unavailable"));
        }

        let free = self.system.available_memory().min(total);
        Ok(MemoryStats {
            total,
            used: total - free,
            free,
        })
    }

    fn network(&mut self) -> Option<NetworkCounters> {
        self.networks.refresh_list();

        let mut names: Vec<&String> = self
            .networks
            .iter()
            .map(|(name, _)| name)
            .filter(|name| !is_loopback(name))
            .collect();
        if names.is_empty() {
            return None;
        }
        names.sort();

        let total_bytes = self
            .networks
            .iter()
            .filter(|(name, _)| !is_loopback(name))
            .map(|(_, data)| data.total_received() + data.total_transmitted())
            .sum();

        Some(NetworkCounters {
            total_bytes,
            primary_interface: names.first().map(|name| name.to_string()),
        })
    }

    fn storage(&mut self) -> Option<DiskTotals> {
        self.disks.refresh_list();

        let (total, available) = self
            .disks
            .iter()
            .fold((0u64, 0u64), |(total, available), disk| {
                (total + disk.total_space(), available + disk.available_space())
            });

        if total == 0 {
            return None;
        }
        Some(DiskTotals {
            total,
            available: available.min(total),
        })
    }

    fn load_average(&self) -> f64 {
        System::load_average().one
    }

    fn uptime_seconds(&self) -> u64 {
        System::uptime()
    }

    fn host_facts(&self) -> HostFacts {
        let cpus = self.system.cpus();

        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .ok()
            .or_else(System::host_name)
            .unwrap_or_else(|| "unknown".to_string());

        let cpu_model = cpus
            .first()
            .map(|c| c.brand().trim().to_string())
            .filter(|brand| !brand.is_empty())
            .unwrap_or_else(|| "Unknown".to_string());

        HostFacts {
            hostname,
            platform: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            cpu_count: if cpus.is_empty() { num_cpus::get() } else { cpus.len() },
            cpu_model,
            cpu_speed_mhz: cpus.first().map(|c| c.frequency()).filter(|mhz| *mhz > 0),
        }
    }
}

/// Check if an interface name is a loopback device
fn is_loopback(name: &str) -> bool {
    name == "lo" || name.starts_with("lo0") || name.to_lowercase().contains("loopback")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_ticks_totals() {
        let ticks = CpuTicks {
            user: 10,
            nice: 2,
            sys: 5,
            idle: 80,
            irq: 3,
        };
        assert_eq!(ticks.total(), 100);
        assert_eq!(ticks.idle_total(), 83);
    }

    #[test]
    fn test_loopback_detection() {
        assert!(is_loopback("lo"));
        assert!(is_loopback("lo0"));
        assert!(is_loopback("Loopback Pseudo-Interface 1"));
        assert!(!is_loopback("eth0"));
        assert!(!is_loopback("wlan0"));
    }

    #[test]
    fn test_sysinfo_source_collection() {
        let mut source = SysinfoSource::new();
        let memory = source.memory().unwrap();
        assert!(memory.total > 0);
        assert!(memory.used + memory.free <= memory.total);

        let facts = source.host_facts();
        assert!(facts.cpu_count > 0);
        assert!(!facts.arch.is_empty());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_linux_reads_per_core_ticks() {
        let mut source = SysinfoSource::new();
        let ticks = source.cpu_ticks().unwrap();
        assert!(!ticks.is_empty());
        assert!(ticks.iter().any(|t| t.total() > 0));
    }
}
