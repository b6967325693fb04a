use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use futures_util::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error, info, warn};

use crate::{
    clock::{Clock, SystemClock},
    error::Result,
    schedule::Cadence,
    types::{Job, TriggerId},
};

/// Longest the driver sleeps before re-reading the wall clock, so clock
/// adjustments are noticed even when the next firing is far away.
const MAX_SLEEP: Duration = Duration::from_secs(60);

/// One (cadence, job) binding.
struct Trigger {
    id: TriggerId,
    spec: String,
    cadence: Cadence,
    job: Arc<dyn Job>,
}

/// Trigger table under construction. Frozen by [`Scheduler::start`].
pub struct Scheduler {
    triggers: Vec<Trigger>,
    zone: Tz,
    clock: Arc<dyn Clock>,
}

impl Scheduler {
    /// Scheduler on the system wall clock; cron cadences are evaluated in `zone`.
    pub fn new(zone: Tz) -> Self {
        Self::with_clock(zone, Arc::new(SystemClock))
    }

    pub fn with_clock(zone: Tz, clock: Arc<dyn Clock>) -> Self {
        Self {
            triggers: Vec::new(),
            zone,
            clock,
        }
    }

    /// Bind `job` to `cadence_spec`.
    ///
    /// A malformed expression returns [`crate::SchedulerError::Parse`] and
    /// leaves the table unchanged.
    pub fn register(&mut self, cadence_spec: &str, job: Arc<dyn Job>) -> Result<TriggerId> {
        let cadence = Cadence::parse(cadence_spec)?;
        let id = TriggerId(self.triggers.len());
        info!(trigger_id = %id, cadence = %cadence_spec, job = job.name(), "trigger registered");
        self.triggers.push(Trigger {
            id,
            spec: cadence_spec.to_string(),
            cadence,
            job,
        });
        Ok(id)
    }

    /// Number of registered triggers.
    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// Spawn the driver task. Must be called inside a tokio runtime.
    pub fn start(self) -> SchedulerHandle {
        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();
        let trigger_count = self.triggers.len();

        let driver = Driver {
            triggers: self.triggers,
            zone: self.zone,
            clock: self.clock,
            shutdown: shutdown.clone(),
            tracker: tracker.clone(),
        };
        let driver = tokio::spawn(driver.run());

        SchedulerHandle {
            shutdown,
            tracker,
            driver,
            trigger_count,
        }
    }
}

/// Running scheduler. Dropping it without [`SchedulerHandle::stop`] leaves
/// the driver running until the runtime shuts down.
pub struct SchedulerHandle {
    shutdown: CancellationToken,
    tracker: TaskTracker,
    driver: JoinHandle<()>,
    trigger_count: usize,
}

impl SchedulerHandle {
    pub fn trigger_count(&self) -> usize {
        self.trigger_count
    }

    /// Number of firings still executing.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Stop scheduling new firings, then wait for the driver to exit and for
    /// every in-flight job to finish. Nothing is cancelled forcibly.
    pub async fn stop(self) {
        info!("scheduler stopping");
        self.shutdown.cancel();
        if let Err(e) = self.driver.await {
            error!("scheduler driver terminated abnormally: {e}");
        }
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            info!(pending, "waiting for in-flight jobs");
        }
        self.tracker.wait().await;
        info!("scheduler stopped");
    }
}

struct Driver {
    triggers: Vec<Trigger>,
    zone: Tz,
    clock: Arc<dyn Clock>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl Driver {
    async fn run(self) {
        info!(triggers = self.triggers.len(), zone = %self.zone, "scheduler started");

        let mut last_seen = self.clock.now();
        let mut next = self.plan(last_seen);

        loop {
            let now = self.clock.now();
            if now < last_seen {
                warn!(
                    from = %last_seen,
                    to = %now,
                    "wall clock moved backwards; recomputing firing times"
                );
                next = self.plan(now);
            }
            last_seen = now;

            for (slot, trigger) in next.iter_mut().zip(&self.triggers) {
                if slot.is_some_and(|at| at <= now) {
                    self.dispatch(trigger);
                    *slot = trigger.cadence.next_after(now, &self.zone);
                    if slot.is_none() {
                        warn!(trigger_id = %trigger.id, cadence = %trigger.spec, "trigger has no further firings");
                    }
                }
            }

            let wait = next
                .iter()
                .flatten()
                .min()
                .map(|at| (*at - now).to_std().unwrap_or(Duration::ZERO))
                .unwrap_or(MAX_SLEEP)
                .min(MAX_SLEEP);

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        debug!("scheduler driver exited");
    }

    fn plan(&self, from: DateTime<Utc>) -> Vec<Option<DateTime<Utc>>> {
        self.triggers
            .iter()
            .map(|t| t.cadence.next_after(from, &self.zone))
            .collect()
    }

    /// Run one firing on its own task, isolating errors and panics.
    fn dispatch(&self, trigger: &Trigger) {
        let id = trigger.id;
        let job = Arc::clone(&trigger.job);
        debug!(trigger_id = %id, job = job.name(), "firing");

        self.tracker.spawn(async move {
            match AssertUnwindSafe(job.run()).catch_unwind().await {
                Ok(Ok(())) => debug!(trigger_id = %id, job = job.name(), "job finished"),
                Ok(Err(e)) => error!(trigger_id = %id, job = job.name(), "job failed: {e:#}"),
                Err(panic) => error!(
                    trigger_id = %id,
                    job = job.name(),
                    "job panicked: {}",
                    panic_message(panic.as_ref())
                ),
            }
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
