//! Host resource sampling
//!
//! Raw OS counters, best-effort hardware lookups, process counters and the
//! stateful sampler that turns them into `MetricsSample` snapshots.

mod hardware;
mod process;
mod resources;
mod sampler;

pub use hardware::{
    HardwareInfo, HardwareLookup, HardwareProbe, HostLookup, NoLookup, Probed,
    DEFAULT_PROBE_TIMEOUT, UNKNOWN,
};
pub use process::{CpuDelta, MemoryDelta, ProcessCounters};
pub use resources::{
    CpuTicks, DiskTotals, HostFacts, HostSource, MemoryStats, NetworkCounters, SysinfoSource,
};
pub use sampler::{cpu_usage_between, EstimatedFields, MetricsSample, Sampler, SharedSampler};

#[cfg(test)]
pub(crate) use sampler::tests::ScriptedSource;
