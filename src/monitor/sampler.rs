//! Host load sampling port.

use sysinfo::System;

/// Reads instantaneous host load. Implementations own any platform detail.
pub trait ResourceSampler: Send {
    /// CPU utilisation, 0-100.
    fn cpu_load(&mut self) -> f64;

    /// Memory in use as a percentage of total, 0-100.
    fn memory_used_percent(&mut self) -> f64;
}

/// Cross-platform sampler backed by `sysinfo`.
pub struct SysinfoSampler {
    system: System,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        // First CPU reading is only meaningful relative to a previous refresh.
        system.refresh_cpu_usage();
        Self { system }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSampler for SysinfoSampler {
    fn cpu_load(&mut self) -> f64 {
        self.system.refresh_cpu_usage();
        f64::from(self.system.global_cpu_usage()).clamp(0.0, 100.0)
    }

    fn memory_used_percent(&mut self) -> f64 {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        if total == 0 {
            return 0.0;
        }
        self.system.used_memory() as f64 / total as f64 * 100.0
    }
}
