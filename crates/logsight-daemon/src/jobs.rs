//! Scheduler bindings for the monitor and maintenance work.

use std::sync::Arc;

use async_trait::async_trait;
use logsight_core::config::{MAINTENANCE_CADENCE, MONITOR_CADENCE};
use logsight_maintenance::{BackupJob, RetentionJob};
use logsight_scheduler::{Job, Scheduler};
use logsight_telemetry::Monitor;
use tracing::{debug, error, info};

/// Samples host and process metrics. Each sampler runs as its own unit so a
/// slow read in one never delays the other.
pub struct MonitorJob {
    monitor: Monitor,
}

impl MonitorJob {
    pub fn new(monitor: Monitor) -> Self {
        Self { monitor }
    }
}

#[async_trait]
impl Job for MonitorJob {
    fn name(&self) -> &str {
        "monitor"
    }

    async fn run(&self) -> anyhow::Result<()> {
        let written = self.monitor.sample_all().await;
        debug!(written, "monitor pass finished");
        Ok(())
    }
}

pub struct BackupTask {
    job: BackupJob,
}

impl BackupTask {
    pub fn new(job: BackupJob) -> Self {
        Self { job }
    }
}

#[async_trait]
impl Job for BackupTask {
    fn name(&self) -> &str {
        "database-backup"
    }

    async fn run(&self) -> anyhow::Result<()> {
        let outcome = self.job.run().await?;
        info!(elapsed_ms = outcome.elapsed.as_millis() as u64, "database backup finished");
        Ok(())
    }
}

pub struct RetentionTask {
    job: RetentionJob,
}

impl RetentionTask {
    pub fn new(job: RetentionJob) -> Self {
        Self { job }
    }
}

#[async_trait]
impl Job for RetentionTask {
    fn name(&self) -> &str {
        "oplog-retention"
    }

    async fn run(&self) -> anyhow::Result<()> {
        self.job.run().await?;
        Ok(())
    }
}

/// The standard job set with its cadences. The backup job is omitted when
/// it could not be built.
pub fn standard_jobs(
    monitor: Monitor,
    backup: Option<BackupJob>,
    retention: RetentionJob,
) -> Vec<(&'static str, Arc<dyn Job>)> {
    let mut jobs: Vec<(&'static str, Arc<dyn Job>)> =
        vec![(MONITOR_CADENCE, Arc::new(MonitorJob::new(monitor)))];
    if let Some(backup) = backup {
        jobs.push((MAINTENANCE_CADENCE, Arc::new(BackupTask::new(backup))));
    }
    jobs.push((MAINTENANCE_CADENCE, Arc::new(RetentionTask::new(retention))));
    jobs
}

/// Register every `(cadence, job)` pair. A pair whose cadence does not parse
/// is logged and skipped. Returns how many were registered.
pub fn register_all(scheduler: &mut Scheduler, jobs: Vec<(&str, Arc<dyn Job>)>) -> usize {
    let mut registered = 0;
    for (cadence, job) in jobs {
        let name = job.name().to_string();
        match scheduler.register(cadence, job) {
            Ok(_) => registered += 1,
            Err(e) => error!(job = %name, cadence, "failed to register trigger: {e}"),
        }
    }
    registered
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Tz;
    use logsight_scheduler::job_fn;

    #[test]
    fn bad_cadence_is_skipped_not_fatal() {
        let mut scheduler = Scheduler::new(Tz::UTC);
        let noop = || async { Ok::<(), anyhow::Error>(()) };
        let registered = register_all(
            &mut scheduler,
            vec![
                ("@every 30s", job_fn("a", noop)),
                ("every now and then", job_fn("b", noop)),
                ("@daily", job_fn("c", noop)),
            ],
        );
        assert_eq!(registered, 2);
        assert_eq!(scheduler.len(), 2);
    }
}
