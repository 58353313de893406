//! Local machine sampling.
//!
//! Each [`Collector`] reads one category of host metrics and returns it as
//! [`MetricPayload`]s. [`local_snapshot`] runs a set of collectors and wraps
//! the result with the host name and capture time, ready to be posted for
//! ingestion.

pub mod cpu;
pub mod memory;

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use snapmon_common::types::{LocalSnapshot, MetricPayload};
use sysinfo::System;

pub use cpu::CpuCollector;
pub use memory::MemoryCollector;

/// A system metric collector that runs on the sampled host.
///
/// Collectors keep their `sysinfo` handle between calls; CPU usage in
/// particular is only meaningful from the second refresh on.
pub trait Collector: Send + Sync {
    /// Collector name (e.g. `"cpu"`), used for logging.
    fn name(&self) -> &str;

    /// Collects current metric values.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying system API call fails.
    fn collect(&mut self) -> Result<Vec<MetricPayload>>;
}

/// CPU and RAM collectors, in that order.
pub fn default_collectors() -> Vec<Box<dyn Collector>> {
    vec![Box::new(CpuCollector::new()), Box::new(MemoryCollector::new())]
}

/// Host name reported as the snapshot origin, `"unknown"` when unavailable.
pub fn device_name() -> String {
    System::host_name().unwrap_or_else(|| "unknown".to_string())
}

/// Runs every collector and builds a snapshot of the local machine.
///
/// A failing collector is logged and skipped so the others still report.
pub fn local_snapshot(collectors: &mut [Box<dyn Collector>]) -> LocalSnapshot {
    let mut metrics = Vec::new();
    for collector in collectors.iter_mut() {
        match collector.collect() {
            Ok(points) => metrics.extend(points),
            Err(e) => {
                tracing::error!(collector = collector.name(), error = %e, "Collection failed")
            }
        }
    }

    LocalSnapshot {
        device_name: device_name(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false),
        metrics,
    }
}
