use serde::{Deserialize, Serialize};

/// Host CPU utilisation, percent.
pub const SYSTEM_CPU_USE: &str = "system_cpuuse";
/// Host memory in use, bytes.
pub const SYSTEM_MEM_USE: &str = "system_memuse";
/// CPU utilisation of this process, percent.
pub const APP_CPU_USE: &str = "app_cpuuse";
/// Resident memory of this process, megabytes.
pub const APP_MEM_USE: &str = "app_memuse";

/// One telemetry sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub metric: String,
    pub value: f64,
    /// Unix seconds.
    pub timestamp: i64,
}

impl MetricPoint {
    pub fn new(metric: impl Into<String>, value: f64, timestamp: i64) -> Self {
        Self {
            metric: metric.into(),
            value,
            timestamp,
        }
    }
}
