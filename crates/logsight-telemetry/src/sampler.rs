//! Host and process metric samplers backed by `sysinfo`.

use std::sync::Mutex;

use chrono::Utc;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::debug;

use crate::{
    error::SampleError,
    types::{MetricPoint, APP_CPU_USE, APP_MEM_USE, SYSTEM_CPU_USE, SYSTEM_MEM_USE},
};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Produces a small fixed set of timestamped points per call.
///
/// All points of one call share a timestamp. Samplers keep their own
/// `System` so CPU utilisation is measured since the previous call.
pub trait Sampler: Send + Sync {
    fn name(&self) -> &'static str;

    fn sample(&self) -> Result<Vec<MetricPoint>, SampleError>;
}

/// Host-wide CPU percent and memory in use (bytes).
pub struct HostSampler {
    sys: Mutex<System>,
}

impl HostSampler {
    pub fn new() -> Self {
        let mut sys = System::new();
        // Prime the CPU counters so the first sample has a baseline.
        sys.refresh_cpu_usage();
        Self {
            sys: Mutex::new(sys),
        }
    }
}

impl Default for HostSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for HostSampler {
    fn name(&self) -> &'static str {
        "host"
    }

    fn sample(&self) -> Result<Vec<MetricPoint>, SampleError> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(SampleError::Unsupported);
        }
        let timestamp = Utc::now().timestamp();

        let mut sys = self.sys.lock().unwrap();
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        let cpu = f64::from(sys.global_cpu_usage());
        let used = sys.used_memory() as f64;

        Ok(vec![
            MetricPoint::new(SYSTEM_CPU_USE, cpu, timestamp),
            MetricPoint::new(SYSTEM_MEM_USE, used, timestamp),
        ])
    }
}

/// CPU percent and resident memory (MB) of one process, by default this one.
pub struct ProcessSampler {
    pid: Pid,
    sys: Mutex<System>,
}

impl ProcessSampler {
    /// Sampler for the current process.
    pub fn current() -> Self {
        Self::for_pid(std::process::id())
    }

    pub fn for_pid(pid: u32) -> Self {
        let pid = Pid::from_u32(pid);
        let mut sys = System::new();
        // CPU usage is a delta between refreshes; take the baseline now.
        sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        Self {
            pid,
            sys: Mutex::new(sys),
        }
    }
}

impl Sampler for ProcessSampler {
    fn name(&self) -> &'static str {
        "process"
    }

    /// Produces no points (rather than an error) when the process cannot be
    /// resolved, e.g. on an unsupported platform.
    fn sample(&self) -> Result<Vec<MetricPoint>, SampleError> {
        let timestamp = Utc::now().timestamp();

        let mut sys = self.sys.lock().unwrap();
        sys.refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
        let Some(process) = sys.process(self.pid) else {
            debug!(pid = %self.pid, "process not resolvable; skipping sample");
            return Ok(Vec::new());
        };

        let cpu = f64::from(process.cpu_usage());
        let rss_mb = (process.memory() / BYTES_PER_MB) as f64;

        Ok(vec![
            MetricPoint::new(APP_CPU_USE, cpu, timestamp),
            MetricPoint::new(APP_MEM_USE, rss_mb, timestamp),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_sampler_emits_two_named_points_per_call() {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return;
        }
        let sampler = HostSampler::new();
        let points = sampler.sample().unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].metric, SYSTEM_CPU_USE);
        assert_eq!(points[1].metric, SYSTEM_MEM_USE);
        assert_eq!(points[0].timestamp, points[1].timestamp);
        assert!((0.0..=100.0).contains(&points[0].value));
        assert!(points[1].value > 0.0);
    }

    #[test]
    fn process_sampler_takes_cpu_baseline_on_construction() {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return;
        }
        let sampler = ProcessSampler::current();
        assert!(sampler.sys.lock().unwrap().process(sampler.pid).is_some());

        let points = sampler.sample().unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].metric, APP_CPU_USE);
        assert_eq!(points[1].metric, APP_MEM_USE);
        assert!(points[0].value >= 0.0);
    }

    #[test]
    fn unknown_process_yields_no_points() {
        // PIDs are bounded well below u32::MAX on every supported platform.
        let sampler = ProcessSampler::for_pid(u32::MAX - 1);
        assert!(sampler.sample().unwrap().is_empty());
    }
}
