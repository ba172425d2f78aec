//! Platform optimization catalog

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Area an optimization targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationArea {
    Cpu,
    Memory,
    Network,
    Compute,
}

impl fmt::Display for OptimizationArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OptimizationArea::Cpu => "cpu",
            OptimizationArea::Memory => "memory",
            OptimizationArea::Network => "network",
            OptimizationArea::Compute => "compute",
        };
        f.write_str(name)
    }
}

impl FromStr for OptimizationArea {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cpu" => Ok(OptimizationArea::Cpu),
            "memory" => Ok(OptimizationArea::Memory),
            "network" => Ok(OptimizationArea::Network),
            "compute" => Ok(OptimizationArea::Compute),
            other => Err(format!("unknown optimization area '{}'", other)),
        }
    }
}

/// Relative level for impact and effort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    Medium,
    High,
}

/// A catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Optimization {
    pub id: &'static str,
    #[serde(rename = "type")]
    pub area: OptimizationArea,
    pub title: &'static str,
    pub description: &'static str,
    /// Expected benefit
    pub impact: Level,
    /// Work required to apply
    pub effort: Level,
}

const CATALOG: &[Optimization] = &[
    Optimization {
        id: "opt-1",
        area: OptimizationArea::Cpu,
        title: "Enable CPU Burst Performance Mode",
        description: "Configure Intel Turbo Boost for burst workloads",
        impact: Level::High,
        effort: Level::Medium,
    },
    Optimization {
        id: "opt-2",
        area: OptimizationArea::Memory,
        title: "Optimize Memory Allocation",
        description: "Use Intel Memory Protection Extensions (MPX) for better memory management",
        impact: Level::Medium,
        effort: Level::Low,
    },
    Optimization {
        id: "opt-3",
        area: OptimizationArea::Network,
        title: "Enable DPDK for Network Acceleration",
        description: "Leverage Intel Data Plane Development Kit for high-performance networking",
        impact: Level::High,
        effort: Level::High,
    },
    Optimization {
        id: "opt-4",
        area: OptimizationArea::Compute,
        title: "Utilize Intel AVX-512 Instructions",
        description: "Enable Advanced Vector Extensions for parallel processing workloads",
        impact: Level::High,
        effort: Level::Medium,
    },
];

/// Catalog entries, optionally restricted to one area
pub fn optimizations(area: Option<OptimizationArea>) -> Vec<&'static Optimization> {
    CATALOG
        .iter()
        .filter(|opt| area.map_or(true, |area| opt.area == area))
        .collect()
}

/// Print catalog entries to console
pub fn print_optimizations(entries: &[&Optimization]) {
    println!("=== Optimizations ===\n");
    for opt in entries {
        println!("[{}] {} ({})", opt.id, opt.title, opt.area);
        println!("   {}", opt.description);
        println!("   Impact: {:?}, Effort: {:?}", opt.impact, opt.effort);
        println!();
    }
}
