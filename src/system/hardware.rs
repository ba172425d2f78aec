//! Best-effort hardware description
//!
//! GPU name, temperature, OS pretty name and kernel release are looked up
//! through a pluggable [`HardwareLookup`]. Every lookup runs on its own
//! thread against a shared deadline, so one slow or missing tool degrades
//! only its own field to [`Probed::Unknown`] and the whole probe never takes
//! longer than a single timeout.

use serde::{Serialize, Serializer};
use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default upper bound for each hardware lookup
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Sentinel reported for fields that could not be determined
pub const UNKNOWN: &str = "unknown";

/// A value that may have failed to probe
#[derive(Debug, Clone, PartialEq)]
pub enum Probed<T> {
    /// The lookup produced a value
    Known(T),
    /// Timed out, tool missing, or output could not be parsed
    Unknown,
}

impl<T> Probed<T> {
    /// Check if the value is known
    pub fn is_known(&self) -> bool {
        matches!(self, Probed::Known(_))
    }

    /// Borrow the value, if known
    pub fn as_known(&self) -> Option<&T> {
        match self {
            Probed::Known(value) => Some(value),
            Probed::Unknown => None,
        }
    }
}

impl<T> From<Option<T>> for Probed<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Probed::Unknown, Probed::Known)
    }
}

impl<T: std::fmt::Display> std::fmt::Display for Probed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Probed::Known(value) => std::fmt::Display::fmt(value, f),
            Probed::Unknown => f.write_str(UNKNOWN),
        }
    }
}

impl<T: Serialize> Serialize for Probed<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Probed::Known(value) => value.serialize(serializer),
            Probed::Unknown => serializer.serialize_str(UNKNOWN),
        }
    }
}

/// Descriptive hardware facts attached to every sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HardwareInfo {
    /// CPU model, trimmed
    pub cpu_name: String,
    /// CPU frequency in MHz (if reported)
    pub cpu_speed_mhz: Option<u64>,
    /// Primary GPU name
    pub gpu_name: Probed<String>,
    /// CPU/package temperature in degrees Celsius
    pub temperature_celsius: Probed<f32>,
    /// Distribution or OS product name
    pub os_version: Probed<String>,
    /// Kernel release
    pub kernel_version: Probed<String>,
}

/// Capability for individual hardware lookups.
///
/// Implementations return `None` on any failure and should give up once
/// `timeout` has elapsed; the probe enforces the same bound regardless.
pub trait HardwareLookup: Send + Sync {
    /// Primary GPU name
    fn gpu_name(&self, timeout: Duration) -> Option<String>;

    /// Temperature in degrees Celsius
    fn temperature_celsius(&self, timeout: Duration) -> Option<f32>;

    /// OS pretty name
    fn os_version(&self, timeout: Duration) -> Option<String>;

    /// Kernel release
    fn kernel_version(&self, timeout: Duration) -> Option<String>;
}

/// Lookup that reports every field as unknown
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLookup;

impl HardwareLookup for NoLookup {
    fn gpu_name(&self, _timeout: Duration) -> Option<String> {
        None
    }

    fn temperature_celsius(&self, _timeout: Duration) -> Option<f32> {
        None
    }

    fn os_version(&self, _timeout: Duration) -> Option<String> {
        None
    }

    fn kernel_version(&self, _timeout: Duration) -> Option<String> {
        None
    }
}

/// Lookup using platform tools and sysfs
#[derive(Debug, Clone, Copy, Default)]
pub struct HostLookup;

/// Thermal sensors checked in order (millidegrees Celsius)
#[cfg(target_os = "linux")]
const THERMAL_SENSORS: &[&str] = &[
    "/sys/class/thermal/thermal_zone0/temp",
    "/sys/class/hwmon/hwmon0/temp1_input",
];

impl HardwareLookup for HostLookup {
    #[cfg(target_os = "linux")]
    fn gpu_name(&self, timeout: Duration) -> Option<String> {
        let deadline = Instant::now() + timeout;

        run_command(
            "nvidia-smi",
            &["--query-gpu=name", "--format=csv,noheader"],
            deadline,
        )
        .and_then(|out| out.lines().next().map(|l| l.trim().to_string()))
        .filter(|name| !name.is_empty())
        .or_else(|| run_command("lspci", &[], deadline).and_then(|out| parse_lspci_vga(&out)))
    }

    #[cfg(target_os = "macos")]
    fn gpu_name(&self, timeout: Duration) -> Option<String> {
        let out = run_command("system_profiler", &["SPDisplaysDataType"], Instant::now() + timeout)?;
        out.lines()
            .find_map(|line| line.trim().strip_prefix("Chipset Model:"))
            .map(|name| name.trim().to_string())
    }

    #[cfg(target_os = "windows")]
    fn gpu_name(&self, timeout: Duration) -> Option<String> {
        let out = run_command(
            "wmic",
            &["path", "win32_VideoController", "get", "name"],
            Instant::now() + timeout,
        )?;
        parse_wmic_column(&out, "Name")
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    fn gpu_name(&self, _timeout: Duration) -> Option<String> {
        None
    }

    #[cfg(target_os = "linux")]
    fn temperature_celsius(&self, _timeout: Duration) -> Option<f32> {
        THERMAL_SENSORS.iter().find_map(|path| {
            std::fs::read_to_string(path)
                .ok()
                .and_then(|content| parse_millidegrees(&content))
        })
    }

    #[cfg(not(target_os = "linux"))]
    fn temperature_celsius(&self, _timeout: Duration) -> Option<f32> {
        None
    }

    fn os_version(&self, _timeout: Duration) -> Option<String> {
        #[cfg(target_os = "linux")]
        {
            if let Some(name) = std::fs::read_to_string("/etc/os-release")
                .ok()
                .and_then(|content| parse_pretty_name(&content))
            {
                return Some(name);
            }
        }

        sysinfo::System::long_os_version()
    }

    fn kernel_version(&self, _timeout: Duration) -> Option<String> {
        sysinfo::System::kernel_version()
    }
}

/// Timeout-bounded hardware prober
#[derive(Clone)]
pub struct HardwareProbe {
    lookup: Arc<dyn HardwareLookup>,
    timeout: Duration,
}

impl HardwareProbe {
    /// Create a probe with an explicit lookup and per-lookup bound
    pub fn new(lookup: Arc<dyn HardwareLookup>, timeout: Duration) -> Self {
        Self { lookup, timeout }
    }

    /// Probe using platform tools with the default bound
    pub fn host() -> Self {
        Self::new(Arc::new(HostLookup), DEFAULT_PROBE_TIMEOUT)
    }

    /// Probe that never looks anything up
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoLookup), DEFAULT_PROBE_TIMEOUT)
    }

    /// Per-lookup bound
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Collect hardware facts. Never fails; unavailable fields are `Unknown`.
    pub fn probe(&self, cpu_model: &str, cpu_speed_mhz: Option<u64>) -> HardwareInfo {
        let deadline = Instant::now() + self.timeout;

        let gpu = self.spawn_lookup("gpu", |lookup, timeout| lookup.gpu_name(timeout));
        let temperature = self.spawn_lookup("temperature", |lookup, timeout| {
            lookup.temperature_celsius(timeout)
        });
        let os = self.spawn_lookup("os_version", |lookup, timeout| lookup.os_version(timeout));
        let kernel = self.spawn_lookup("kernel_version", |lookup, timeout| {
            lookup.kernel_version(timeout)
        });

        HardwareInfo {
            cpu_name: cpu_model.trim().to_string(),
            cpu_speed_mhz,
            gpu_name: Self::settle("gpu", gpu, deadline),
            temperature_celsius: Self::settle("temperature", temperature, deadline),
            os_version: Self::settle("os_version", os, deadline),
            kernel_version: Self::settle("kernel_version", kernel, deadline),
        }
    }

    fn spawn_lookup<T, F>(&self, field: &'static str, lookup_fn: F) -> mpsc::Receiver<Option<T>>
    where
        T: Send + 'static,
        F: FnOnce(&dyn HardwareLookup, Duration) -> Option<T> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let lookup = Arc::clone(&self.lookup);
        let timeout = self.timeout;

        let spawned = thread::Builder::new()
            .name(format!("probe-{}", field))
            .spawn(move || {
                // The receiver may have given up already
                let _ = tx.send(lookup_fn(lookup.as_ref(), timeout));
            });

        if let Err(e) = spawned {
            warn!("Could not start {} lookup: {}", field, e);
        }
        rx
    }

    fn settle<T>(field: &str, rx: mpsc::Receiver<Option<T>>, deadline: Instant) -> Probed<T> {
        let remaining = deadline.saturating_duration_since(Instant::now());

        match rx.recv_timeout(remaining) {
            Ok(value) => {
                if value.is_none() {
                    debug!("{} lookup unavailable", field);
                }
                value.into()
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("{} lookup exceeded its time bound", field);
                Probed::Unknown
            }
            Err(RecvTimeoutError::Disconnected) => Probed::Unknown,
        }
    }
}

impl std::fmt::Debug for HardwareProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareProbe")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Run a command, killing it once `deadline` passes.
///
/// Returns trimmed stdout of a successful, non-empty run. Stdout is drained
/// on a reader thread while the child runs, so output larger than the pipe
/// buffer cannot stall it.
fn run_command(program: &str, args: &[&str], deadline: Instant) -> Option<String> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .ok()?;

    let mut stdout = child.stdout.take()?;
    let reader = thread::spawn(move || {
        let mut out = Vec::new();
        stdout.read_to_end(&mut out).map(|_| out)
    });

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) if Instant::now() >= deadline => {
                debug!("{} did not finish in time, killing it", program);
                let _ = child.kill();
                let _ = child.wait();
                break None;
            }
            Ok(None) => thread::sleep(Duration::from_millis(5)),
            Err(_) => {
                let _ = child.kill();
                let _ = child.wait();
                break None;
            }
        }
    };

    // A killed child's descendants may still hold the pipe, leave the reader detached
    if !status?.success() {
        return None;
    }
    let out = reader.join().ok()?.ok()?;

    let s = String::from_utf8_lossy(&out).trim().to_string();
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Extract the device name from the first VGA line of `lspci` output
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_lspci_vga(output: &str) -> Option<String> {
    output
        .lines()
        .find(|line| line.to_lowercase().contains("vga"))
        .and_then(|line| line.splitn(3, ':').nth(2))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Parse a sysfs temperature in millidegrees; non-positive readings are rejected
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_millidegrees(content: &str) -> Option<f32> {
    let millis: i64 = content.trim().parse().ok()?;
    if millis <= 0 {
        return None;
    }
    Some(millis as f32 / 1000.0)
}

/// Extract `PRETTY_NAME` from os-release content
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_pretty_name(content: &str) -> Option<String> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("PRETTY_NAME="))
        .map(|value| value.trim().trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}

/// First data row of a single-column `wmic` listing
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
fn parse_wmic_column(output: &str, header: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && *line != header)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowGpuLookup {
        delay: Duration,
    }

    impl HardwareLookup for SlowGpuLookup {
        fn gpu_name(&self, _timeout: Duration) -> Option<String> {
            thread::sleep(self.delay);
            Some("Slow GPU".to_string())
        }

        fn temperature_celsius(&self, _timeout: Duration) -> Option<f32> {
            Some(42.5)
        }

        fn os_version(&self, _timeout: Duration) -> Option<String> {
            Some("Test OS 1.0".to_string())
        }

        fn kernel_version(&self, _timeout: Duration) -> Option<String> {
            None
        }
    }

    #[test]
    fn test_slow_lookup_degrades_only_its_field() {
        let probe = HardwareProbe::new(
            Arc::new(SlowGpuLookup {
                delay: Duration::from_secs(3),
            }),
            Duration::from_millis(200),
        );

        let start = Instant::now();
        let info = probe.probe("  Test CPU  ", Some(3200));
        let elapsed = start.elapsed();

        assert_eq!(info.gpu_name, Probed::Unknown);
        assert_eq!(info.temperature_celsius, Probed::Known(42.5));
        assert_eq!(info.os_version, Probed::Known("Test OS 1.0".to_string()));
        assert_eq!(info.kernel_version, Probed::Unknown);
        assert_eq!(info.cpu_name, "Test CPU");
        assert!(elapsed < Duration::from_secs(1), "probe took {:?}", elapsed);
    }

    #[test]
    fn test_disabled_probe_is_all_unknown() {
        let info = HardwareProbe::disabled().probe("cpu", None);
        assert!(!info.gpu_name.is_known());
        assert!(!info.temperature_celsius.is_known());
        assert!(!info.os_version.is_known());
        assert!(!info.kernel_version.is_known());
    }

    #[test]
    fn test_unknown_serializes_as_sentinel() {
        let unknown: Probed<f32> = Probed::Unknown;
        assert_eq!(serde_json::to_string(&unknown).unwrap(), "\"unknown\"");

        let known = Probed::Known(41.0f32);
        assert_eq!(serde_json::to_string(&known).unwrap(), "41.0");
        assert_eq!(known.to_string(), "41");
    }

    #[test]
    fn test_parse_lspci_vga() {
        let output = "00:00.0 Host bridge: Intel Corporation Device 9b61\n\
                      00:02.0 VGA compatible controller: Intel Corporation UHD Graphics 620\n";
        assert_eq!(
            parse_lspci_vga(output),
            Some("Intel Corporation UHD Graphics 620".to_string())
        );
        assert_eq!(parse_lspci_vga("00:1f.3 Audio device: Intel"), None);
    }

    #[test]
    fn test_parse_millidegrees() {
        assert_eq!(parse_millidegrees("45000\n"), Some(45.0));
        assert_eq!(parse_millidegrees("0"), None);
        assert_eq!(parse_millidegrees("-1000"), None);
        assert_eq!(parse_millidegrees("n/a"), None);
    }

    #[test]
    fn test_parse_pretty_name() {
        let content = "NAME=\"Ubuntu\"\nPRETTY_NAME=\"Ubuntu 24.04.1 LTS\"\nID=ubuntu\n";
        assert_eq!(parse_pretty_name(content), Some("Ubuntu 24.04.1 LTS".to_string()));
        assert_eq!(parse_pretty_name("ID=alpine\n"), None);
    }

    #[test]
    fn test_parse_wmic_column() {
        let output = "Name  \r\nNVIDIA GeForce RTX 3060  \r\n\r\n";
        assert_eq!(
            parse_wmic_column(output, "Name"),
            Some("NVIDIA GeForce RTX 3060".to_string())
        );
    }

    #[test]
    fn test_missing_command_is_none() {
        let deadline = Instant::now() + Duration::from_millis(200);
        assert_eq!(run_command("hostmon-no-such-tool", &[], deadline), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_output_larger_than_pipe_buffer() {
        let started = Instant::now();
        let deadline = started + Duration::from_secs(5);
        let out = run_command(
            "sh",
            &["-c", "head -c 200000 /dev/zero | tr '\\0' 'a'"],
            deadline,
        );

        assert_eq!(out.map(|s| s.len()), Some(200_000));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_and_overdue_commands_are_none() {
        let deadline = Instant::now() + Duration::from_secs(2);
        assert_eq!(run_command("sh", &["-c", "echo partial; exit 3"], deadline), None);

        let started = Instant::now();
        let deadline = started + Duration::from_millis(200);
        assert_eq!(run_command("sh", &["-c", "sleep 5"], deadline), None);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
