//! Process lifecycle.
//!
//! ```text
//! Uninitialized -> Configuring -> AwaitingStorageReady -> Running -> ShuttingDown -> Stopped
//! ```
//!
//! Only an unsupported database engine (and I/O failures opening storage)
//! abort startup. Everything after storage is open degrades to log output.

use std::{fmt, sync::Arc, time::Duration};

use chrono_tz::Tz;
use logsight_core::{tz, LogsightConfig, LogsightError, Result};
use logsight_maintenance::{BackupJob, RetentionJob};
use logsight_scheduler::{Clock, Scheduler, SchedulerHandle, SystemClock};
use logsight_store::{checks, Database, Settings, StoreError};
use logsight_telemetry::{HostSampler, Monitor, ProcessSampler, SqliteTelemetryStore, TelemetrySink};
use tracing::{error, info, warn};

use crate::{
    jobs,
    logging::{self, LoggingGuard},
};

const READY_CHECK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Configuring,
    AwaitingStorageReady,
    Running,
    ShuttingDown,
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Configuring => "configuring",
            LifecycleState::AwaitingStorageReady => "awaiting-storage-ready",
            LifecycleState::Running => "running",
            LifecycleState::ShuttingDown => "shutting-down",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Owns configuration, storage, telemetry and the scheduler for the life of
/// the process.
pub struct Application {
    state: LifecycleState,
    config: Arc<LogsightConfig>,
    zone: Tz,
    clock: Arc<dyn Clock>,
    db: Option<Database>,
    telemetry: Option<Arc<dyn TelemetrySink>>,
    scheduler: Option<SchedulerHandle>,
    logging: Option<LoggingGuard>,
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl Application {
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Uninitialized,
            config: Arc::new(LogsightConfig::default()),
            zone: Tz::UTC,
            clock: Arc::new(SystemClock),
            db: None,
            telemetry: None,
            scheduler: None,
            logging: None,
        }
    }

    /// Drive the scheduler from `clock` instead of the wall clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run every startup phase up to `Running`.
    pub async fn launch(config: LogsightConfig, install_logging: bool) -> Result<Self> {
        let mut app = Self::new();
        app.configure(config, install_logging)?;
        app.open_storage()?;
        app.start().await?;
        Ok(app)
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn config(&self) -> &LogsightConfig {
        &self.config
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }

    pub fn database(&self) -> Option<&Database> {
        self.db.as_ref()
    }

    /// Settings accessor over the open database.
    pub fn settings(&self) -> Option<Settings> {
        self.db.clone().map(Settings::new)
    }

    /// Registered triggers, once running.
    pub fn trigger_count(&self) -> usize {
        self.scheduler.as_ref().map_or(0, |s| s.trigger_count())
    }

    /// `Uninitialized -> Configuring`: apply the timezone and install logging.
    ///
    /// An unknown timezone is logged and UTC stays in effect. With
    /// `install_logging` false the caller is expected to own the subscriber.
    pub fn configure(&mut self, config: LogsightConfig, install_logging: bool) -> Result<()> {
        self.expect_state(LifecycleState::Uninitialized, "configure")?;
        self.state = LifecycleState::Configuring;

        let zone = tz::resolve(&config.system.location);
        self.zone = *zone.as_ref().unwrap_or(&Tz::UTC);

        if install_logging {
            match logging::init(&config.logger, self.zone) {
                Ok(guard) => self.logging = Some(guard),
                Err(e) => eprintln!("logging unavailable: {e:#}"),
            }
        }
        if let Err(e) = zone {
            error!("invalid system.location, keeping UTC: {e}");
        }
        if !tz::set_local_zone(self.zone) && tz::local_zone() != self.zone {
            warn!(zone = %self.zone, "process timezone already set; keeping {}", tz::local_zone());
        }

        info!(
            zone = %self.zone,
            console = config.logger.console_enable,
            file = config.logger.file_enable,
            loki = config.logger.loki_enable,
            queue_size = config.logger.queue_size,
            metrics_history = config.logger.metrics_history,
            "configuration applied"
        );
        self.config = Arc::new(config);
        Ok(())
    }

    /// `Configuring -> AwaitingStorageReady`: open the relational and
    /// telemetry stores.
    pub fn open_storage(&mut self) -> Result<()> {
        self.expect_state(LifecycleState::Configuring, "open storage")?;
        self.config.validate()?;

        let db = Database::open(&self.config.database).map_err(|e| match e {
            StoreError::UnsupportedEngine(kind) => {
                LogsightError::FatalConfig(format!("unsupported database type '{kind}'"))
            }
            other => LogsightError::Database(other.to_string()),
        })?;
        let telemetry = SqliteTelemetryStore::open(
            &self.config.logger.metrics_storage,
            self.config.logger.metrics_history,
        )
        .map_err(|e| LogsightError::Database(format!("telemetry store: {e}")))?;

        self.db = Some(db);
        self.telemetry = Some(Arc::new(telemetry));
        self.state = LifecycleState::AwaitingStorageReady;
        Ok(())
    }

    /// `AwaitingStorageReady -> Running`: wait out the grace delay, check
    /// storage, run the post-checks, then register jobs and start the
    /// scheduler.
    pub async fn start(&mut self) -> Result<()> {
        self.expect_state(LifecycleState::AwaitingStorageReady, "start")?;
        let (Some(db), Some(telemetry)) = (self.db.clone(), self.telemetry.clone()) else {
            return Err(LogsightError::Internal("storage not open".to_string()));
        };

        let grace = Duration::from_secs(self.config.system.startup_grace_secs);
        if !grace.is_zero() {
            info!(grace_secs = grace.as_secs(), "waiting for storage to settle");
            tokio::time::sleep(grace).await;
        }

        if await_storage(&db, self.config.system.readiness_retries).await {
            let db = db.clone();
            let report = tokio::task::spawn_blocking(move || {
                checks::run_post_checks(&db, env!("CARGO_PKG_VERSION"))
            })
            .await
            .map_err(|e| LogsightError::Internal(format!("post-checks task: {e}")))?;
            info!(?report, "startup post-checks finished");
        } else {
            error!("storage never became ready; skipping post-checks");
        }

        let monitor = Monitor::new(telemetry)
            .with_sampler(Arc::new(HostSampler::new()))
            .with_sampler(Arc::new(ProcessSampler::current()));
        let backup = BackupJob::from_config(&self.config)
            .map_err(|e| error!("backup job disabled: {e}"))
            .ok();
        let retention = RetentionJob::new(db);

        let mut scheduler = Scheduler::with_clock(self.zone, Arc::clone(&self.clock));
        let registered = jobs::register_all(
            &mut scheduler,
            jobs::standard_jobs(monitor, backup, retention),
        );
        self.scheduler = Some(scheduler.start());
        self.state = LifecycleState::Running;
        info!(triggers = registered, "scheduler started");
        Ok(())
    }

    /// `Running -> ShuttingDown -> Stopped`. Waits for in-flight jobs, then
    /// flushes logging. Calling it again is a no-op.
    pub async fn shutdown(&mut self) {
        if self.state == LifecycleState::Stopped {
            return;
        }
        self.state = LifecycleState::ShuttingDown;
        info!("shutting down");
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.stop().await;
        }
        info!("shutdown complete");
        if let Some(logging) = self.logging.take() {
            logging.release().await;
        }
        self.state = LifecycleState::Stopped;
    }

    fn expect_state(&self, expected: LifecycleState, action: &str) -> Result<()> {
        if self.state == expected {
            return Ok(());
        }
        Err(LogsightError::Internal(format!(
            "cannot {action} while {} (expected {expected})",
            self.state
        )))
    }
}

/// Ping storage up to `retries` times, one second apart.
async fn await_storage(db: &Database, retries: u32) -> bool {
    let attempts = retries.max(1);
    for attempt in 1..=attempts {
        let ping = {
            let db = db.clone();
            tokio::task::spawn_blocking(move || db.ping())
        };
        match ping.await {
            Ok(Ok(())) => return true,
            Ok(Err(e)) => warn!(attempt, attempts, "storage not ready: {e}"),
            Err(e) => warn!(attempt, attempts, "storage ping task failed: {e}"),
        }
        if attempt < attempts {
            tokio::time::sleep(READY_CHECK_INTERVAL).await;
        }
    }
    false
}
