use std::path::Path;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{LogsightError, Result};

/// The only relational engine the store layer knows how to open.
pub const SUPPORTED_DB_TYPE: &str = "sqlite";
/// Cadence of the host/process monitor firing.
pub const MONITOR_CADENCE: &str = "@every 30s";
/// Cadence shared by the backup and retention jobs.
pub const MAINTENANCE_CADENCE: &str = "@daily";
/// Operational-log rows older than this are pruned by the retention job.
pub const OPLOG_RETENTION_DAYS: i64 = 365;
pub const DEFAULT_STARTUP_GRACE_SECS: u64 = 3;
pub const DEFAULT_READINESS_RETRIES: u32 = 5;
pub const DEFAULT_LOG_QUEUE_SIZE: usize = 4096;
pub const DEFAULT_METRICS_HISTORY_DAYS: u32 = 7;

/// Top-level config (logsight.toml + LOGSIGHT_* env overrides).
///
/// Relative paths (database, log file, telemetry store, backup dir and
/// template) are resolved against `system.workdir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsightConfig {
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logger: LoggerConfig,
    #[serde(default)]
    pub backup: BackupConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// IANA zone name, e.g. "Asia/Shanghai". Empty means UTC.
    #[serde(default)]
    pub location: String,
    #[serde(default = "default_workdir")]
    pub workdir: String,
    /// Wait before the startup post-checks touch the database.
    #[serde(default = "default_grace_secs")]
    pub startup_grace_secs: u64,
    /// Readiness checks attempted after the grace delay (one per second).
    #[serde(default = "default_readiness_retries")]
    pub readiness_retries: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            location: String::new(),
            workdir: default_workdir(),
            startup_grace_secs: DEFAULT_STARTUP_GRACE_SECS,
            readiness_retries: DEFAULT_READINESS_RETRIES,
        }
    }
}

/// Connection parameters for the relational store.
///
/// `path` is what the SQLite engine opens. The network parameters are not used
/// to connect; they are substituted into the backup script template so a
/// custom template can target a server-side dump tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(rename = "type", default = "default_db_type")]
    pub kind: String,
    /// Relative paths are resolved against `system.workdir`.
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default = "default_db_host")]
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    #[serde(default = "default_db_user")]
    pub user: String,
    #[serde(default)]
    pub passwd: String,
    #[serde(default = "default_db_name")]
    pub name: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            kind: default_db_type(),
            path: default_db_path(),
            host: default_db_host(),
            port: default_db_port(),
            user: default_db_user(),
            passwd: String::new(),
            name: default_db_name(),
        }
    }
}

/// Logging subsystem options. Each sink is switched on independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// "development" enables debug output; anything else logs at info.
    #[serde(default = "default_log_mode")]
    pub mode: String,
    #[serde(default = "bool_true")]
    pub console_enable: bool,
    #[serde(default)]
    pub file_enable: bool,
    #[serde(default = "default_log_filename")]
    pub filename: String,
    #[serde(default)]
    pub loki_enable: bool,
    #[serde(default)]
    pub loki_api: String,
    #[serde(default)]
    pub loki_user: String,
    #[serde(default)]
    pub loki_pwd: String,
    #[serde(default = "default_loki_job")]
    pub loki_job: String,
    /// Upper bound on buffered log lines per asynchronous sink.
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    /// Telemetry retention window, in days.
    #[serde(default = "default_metrics_history")]
    pub metrics_history: u32,
    /// Telemetry database path.
    #[serde(default = "default_metrics_storage")]
    pub metrics_storage: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            mode: default_log_mode(),
            console_enable: true,
            file_enable: false,
            filename: default_log_filename(),
            loki_enable: false,
            loki_api: String::new(),
            loki_user: String::new(),
            loki_pwd: String::new(),
            loki_job: default_loki_job(),
            queue_size: DEFAULT_LOG_QUEUE_SIZE,
            metrics_history: DEFAULT_METRICS_HISTORY_DAYS,
            metrics_storage: default_metrics_storage(),
        }
    }
}

impl LoggerConfig {
    pub fn is_development(&self) -> bool {
        self.mode.eq_ignore_ascii_case("development")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Directory the backup script writes its dumps into.
    #[serde(default = "default_backup_dir")]
    pub dir: String,
    /// Optional script template replacing the built-in one.
    pub template: Option<String>,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: default_backup_dir(),
            template: None,
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_workdir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.logsight", home)
}
fn default_grace_secs() -> u64 {
    DEFAULT_STARTUP_GRACE_SECS
}
fn default_readiness_retries() -> u32 {
    DEFAULT_READINESS_RETRIES
}
fn default_db_type() -> String {
    SUPPORTED_DB_TYPE.to_string()
}
fn default_db_path() -> String {
    "logsight.db".to_string()
}
fn default_db_host() -> String {
    "127.0.0.1".to_string()
}
fn default_db_port() -> u16 {
    5432
}
fn default_db_user() -> String {
    "logsight".to_string()
}
fn default_db_name() -> String {
    "logsight".to_string()
}
fn default_log_mode() -> String {
    "production".to_string()
}
fn default_log_filename() -> String {
    "logs/logsight.log".to_string()
}
fn default_loki_job() -> String {
    "logsight".to_string()
}
fn default_queue_size() -> usize {
    DEFAULT_LOG_QUEUE_SIZE
}
fn default_metrics_history() -> u32 {
    DEFAULT_METRICS_HISTORY_DAYS
}
fn default_metrics_storage() -> String {
    "data/metrics.db".to_string()
}
fn default_backup_dir() -> String {
    "backup".to_string()
}

const REDACTED: &str = "***";

impl Default for LogsightConfig {
    fn default() -> Self {
        let mut config = Self {
            system: SystemConfig::default(),
            database: DatabaseConfig::default(),
            logger: LoggerConfig::default(),
            backup: BackupConfig::default(),
        };
        config.resolve_paths();
        config
    }
}

impl LogsightConfig {
    /// Load config from a TOML file with LOGSIGHT_* env var overrides.
    ///
    /// Nested keys use a double underscore: `LOGSIGHT_DATABASE__PATH`.
    /// Falls back to `~/.logsight/logsight.toml` when no path is given.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: LogsightConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("LOGSIGHT_").split("__"))
            .extract()
            .map_err(|e| LogsightError::Config(e.to_string()))?;

        let mut config = config;
        config.resolve_paths();
        Ok(config)
    }

    /// Anchor every relative path on `system.workdir`.
    pub fn resolve_paths(&mut self) {
        let workdir = Path::new(&self.system.workdir);
        let anchor = |path: &mut String| {
            if !path.is_empty() && Path::new(path.as_str()).is_relative() {
                *path = workdir.join(path.as_str()).display().to_string();
            }
        };
        anchor(&mut self.database.path);
        anchor(&mut self.logger.filename);
        anchor(&mut self.logger.metrics_storage);
        anchor(&mut self.backup.dir);
        if let Some(template) = self.backup.template.as_mut() {
            anchor(template);
        }
    }

    /// Copy safe to print: secrets are masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for secret in [&mut copy.database.passwd, &mut copy.logger.loki_pwd] {
            if !secret.is_empty() {
                *secret = REDACTED.to_string();
            }
        }
        copy
    }

    /// Reject configurations the process cannot run with at all.
    pub fn validate(&self) -> Result<()> {
        if self.database.kind != SUPPORTED_DB_TYPE {
            return Err(LogsightError::FatalConfig(format!(
                "unsupported database type '{}' (only '{}' is available)",
                self.database.kind, SUPPORTED_DB_TYPE
            )));
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    format!("{}/logsight.toml", default_workdir())
}
