use crate::Collector;
use anyhow::Result;
use snapmon_common::types::MetricPayload;
use sysinfo::System;

/// Global CPU utilisation as `"CPU Usage"` in percent.
pub struct CpuCollector {
    system: System,
}

impl CpuCollector {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        Self { system }
    }
}

impl Default for CpuCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for CpuCollector {
    fn name(&self) -> &str {
        "cpu"
    }

    fn collect(&mut self) -> Result<Vec<MetricPayload>> {
        self.system.refresh_cpu_all();
        let usage = self.system.global_cpu_usage() as f64;
        // No reading yet on some platforms
        let usage = if usage.is_finite() { usage.clamp(0.0, 100.0) } else { 0.0 };
        Ok(vec![MetricPayload::new("CPU Usage", usage, "%")])
    }
}
