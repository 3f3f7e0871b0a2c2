//! Local resource metrics: CPU, RAM and battery.

use std::fs;
use std::path::{Path, PathBuf};

use heartbeat_core::{CpuUtilisation, MetricsError, MetricsSnapshot};
use parking_lot::Mutex;
use sysinfo::System;

/// Where Linux exposes batteries and chargers.
const POWER_SUPPLY_DIR: &str = "/sys/class/power_supply";

/// Produces one snapshot of local resource usage per call. May block.
pub trait MetricsSource: Send + Sync {
    fn snapshot(&self) -> Result<MetricsSnapshot, MetricsError>;
}

/// [`MetricsSource`] backed by `sysinfo`, with battery level read from sysfs.
pub struct SysinfoMetricsSource {
    system: Mutex<System>,
    per_core: bool,
    power_supply_dir: PathBuf,
}

impl SysinfoMetricsSource {
    pub fn new(per_core: bool) -> Self {
        Self::with_power_supply_dir(per_core, POWER_SUPPLY_DIR)
    }

    pub fn with_power_supply_dir(per_core: bool, dir: impl Into<PathBuf>) -> Self {
        let mut system = System::new();
        // CPU usage is a delta between two refreshes; prime the first one.
        system.refresh_cpu_usage();
        system.refresh_memory();
        Self {
            system: Mutex::new(system),
            per_core,
            power_supply_dir: dir.into(),
        }
    }
}

impl MetricsSource for SysinfoMetricsSource {
    fn snapshot(&self) -> Result<MetricsSnapshot, MetricsError> {
        let mut system = self.system.lock();
        system.refresh_cpu_usage();
        system.refresh_memory();

        let cpus = system.cpus();
        if cpus.is_empty() {
            return Err(MetricsError::Unavailable("no CPUs reported".into()));
        }
        let cpu = if self.per_core {
            CpuUtilisation::PerCore(cpus.iter().map(sysinfo::Cpu::cpu_usage).collect())
        } else {
            CpuUtilisation::Aggregate(system.global_cpu_usage())
        };

        let total = system.total_memory();
        if total == 0 {
            return Err(MetricsError::Unavailable("total memory reported as zero".into()));
        }
        let ram_percent = (system.used_memory() as f64 / total as f64 * 100.0) as f32;

        Ok(MetricsSnapshot {
            battery_percent: read_battery_percent(&self.power_supply_dir),
            cpu,
            ram_percent,
        })
    }
}

/// Capacity of the first power supply whose `type` is `Battery`.
///
/// `None` when the machine has no battery or sysfs is unavailable.
pub fn read_battery_percent(dir: &Path) -> Option<f32> {
    let mut supplies: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    supplies.sort();

    supplies.iter().find_map(|supply| {
        let kind = fs::read_to_string(supply.join("type")).ok()?;
        if kind.trim() != "Battery" {
            return None;
        }
        fs::read_to_string(supply.join("capacity"))
            .ok()?
            .trim()
            .parse::<f32>()
            .ok()
    })
}
