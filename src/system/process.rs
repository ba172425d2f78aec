//! Process-level counters
//!
//! CPU time comes from `getrusage(RUSAGE_SELF)`. Memory comes from
//! `/proc/self/status` on Linux: resident set size, the data segment size
//! (heap total) and anonymous resident memory (heap in use).

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

/// Counters for the current process at one instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessCounters {
    /// CPU seconds spent in user mode
    pub cpu_user_secs: f64,
    /// CPU seconds spent in kernel mode
    pub cpu_sys_secs: f64,
    /// Resident set size in bytes
    pub rss_bytes: u64,
    /// Data segment size in bytes
    pub heap_total_bytes: u64,
    /// Anonymous resident memory in bytes
    pub heap_used_bytes: u64,
}

/// CPU seconds consumed between two captures
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpuDelta {
    /// User-mode seconds
    pub user: f64,
    /// Kernel-mode seconds
    pub sys: f64,
}

impl CpuDelta {
    /// Total CPU seconds
    pub fn total(&self) -> f64 {
        self.user + self.sys
    }
}

/// Memory change between two captures (bytes, may be negative)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryDelta {
    /// Resident set size change
    pub rss: i64,
    /// Data segment size change
    pub heap_total: i64,
    /// Anonymous resident memory change
    pub heap_used: i64,
}

impl ProcessCounters {
    /// Capture the current process counters.
    ///
    /// Counters the platform does not expose are reported as zero.
    pub fn capture() -> Self {
        let (cpu_user_secs, cpu_sys_secs) = cpu_times();
        let (rss_bytes, heap_total_bytes, heap_used_bytes) = memory_usage();

        ProcessCounters {
            cpu_user_secs,
            cpu_sys_secs,
            rss_bytes,
            heap_total_bytes,
            heap_used_bytes,
        }
    }

    /// CPU time consumed since `earlier`
    pub fn cpu_since(&self, earlier: &ProcessCounters) -> CpuDelta {
        CpuDelta {
            user: (self.cpu_user_secs - earlier.cpu_user_secs).max(0.0),
            sys: (self.cpu_sys_secs - earlier.cpu_sys_secs).max(0.0),
        }
    }

    /// Memory change since `earlier`
    pub fn memory_since(&self, earlier: &ProcessCounters) -> MemoryDelta {
        MemoryDelta {
            rss: signed_delta(self.rss_bytes, earlier.rss_bytes),
            heap_total: signed_delta(self.heap_total_bytes, earlier.heap_total_bytes),
            heap_used: signed_delta(self.heap_used_bytes, earlier.heap_used_bytes),
        }
    }

    /// Print process counters to console
    pub fn print_summary(&self, started: Instant) {
        println!("=== Process ===\n");
        println!("CPU user:    {:.3}s", self.cpu_user_secs);
        println!("CPU system:  {:.3}s", self.cpu_sys_secs);
        println!("RSS:         {}", humansize::format_size(self.rss_bytes, humansize::BINARY));
        println!("Heap total:  {}", humansize::format_size(self.heap_total_bytes, humansize::BINARY));
        println!("Heap used:   {}", humansize::format_size(self.heap_used_bytes, humansize::BINARY));
        println!(
            "Uptime:      {}",
            humantime::format_duration(std::time::Duration::from_secs(started.elapsed().as_secs()))
        );
    }
}

fn signed_delta(after: u64, before: u64) -> i64 {
    after as i64 - before as i64
}

#[cfg(unix)]
fn cpu_times() -> (f64, f64) {
    // SAFETY: rusage is plain data and getrusage only writes into it
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
    if rc != 0 {
        debug!("getrusage failed: {}", std::io::Error::last_os_error());
        return (0.0, 0.0);
    }

    let seconds = |tv: libc::timeval| tv.tv_sec as f64 + tv.tv_usec as f64 / 1_000_000.0;
    (seconds(usage.ru_utime), seconds(usage.ru_stime))
}

#[cfg(not(unix))]
fn cpu_times() -> (f64, f64) {
    (0.0, 0.0)
}

#[cfg(target_os = "linux")]
fn memory_usage() -> (u64, u64, u64) {
    use procfs::process::Process;

    match Process::myself().and_then(|p| p.status()) {
        Ok(status) => {
            let kib = |value: Option<u64>| value.unwrap_or(0) * 1024;
            (kib(status.vmrss), kib(status.vmdata), kib(status.rssanon))
        }
        Err(e) => {
            debug!("reading /proc/self/status failed: {}", e);
            (0, 0, 0)
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn memory_usage() -> (u64, u64, u64) {
    (0, 0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counters(user: f64, sys: f64, rss: u64, heap_total: u64, heap_used: u64) -> ProcessCounters {
        ProcessCounters {
            cpu_user_secs: user,
            cpu_sys_secs: sys,
            rss_bytes: rss,
            heap_total_bytes: heap_total,
            heap_used_bytes: heap_used,
        }
    }

    #[test]
    fn test_deltas() {
        let before = counters(1.0, 0.5, 4096, 8192, 2048);
        let after = counters(1.25, 0.75, 2048, 16384, 4096);

        let cpu = after.cpu_since(&before);
        assert!((cpu.user - 0.25).abs() < 1e-9);
        assert!((cpu.sys - 0.25).abs() < 1e-9);
        assert!((cpu.total() - 0.5).abs() < 1e-9);

        let memory = after.memory_since(&before);
        assert_eq!(memory.rss, -2048);
        assert_eq!(memory.heap_total, 8192);
        assert_eq!(memory.heap_used, 2048);
    }

    #[test]
    fn test_capture_is_monotonic_in_cpu_time() {
        let first = ProcessCounters::capture();
        let mut acc = 0.0f64;
        for i in 0..200_000 {
            acc += (i as f64).sqrt();
        }
        std::hint::black_box(acc);
        let second = ProcessCounters::capture();

        assert!(second.cpu_user_secs >= first.cpu_user_secs);
        assert!(second.cpu_sys_secs >= first.cpu_sys_secs);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_capture_reports_memory_on_linux() {
        let counters = ProcessCounters::capture();
        assert!(counters.rss_bytes > 0);
    }
}
