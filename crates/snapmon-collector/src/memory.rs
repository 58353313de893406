use crate::Collector;
use anyhow::Result;
use snapmon_common::types::MetricPayload;
use sysinfo::System;

const BYTES_PER_MB: f64 = 1_000_000.0;

/// Used physical memory as `"RAM Usage"` in (decimal) megabytes.
pub struct MemoryCollector {
    system: System,
}

impl MemoryCollector {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for MemoryCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for MemoryCollector {
    fn name(&self) -> &str {
        "memory"
    }

    fn collect(&mut self) -> Result<Vec<MetricPayload>> {
        self.system.refresh_memory();
        let used_mb = self.system.used_memory() as f64 / BYTES_PER_MB;
        Ok(vec![MetricPayload::new("RAM Usage", used_mb, "MB")])
    }
}
